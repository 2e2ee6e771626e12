/*!
 * Speech synthesis stage.
 *
 * - `pool`: bounded worker pool
 * - `batch`: one pass over a set of paragraphs
 * - `driver`: repeated passes over a book until it is done or out of rounds
 */

pub mod batch;
pub mod driver;
pub mod pool;

pub use batch::{BatchOutcome, BatchSynthesizer, ProgressCallback};
pub use driver::{SynthesisDriver, SynthesisReport};
pub use pool::WorkerPool;
