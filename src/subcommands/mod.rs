mod eval;
pub use self::eval::EvalApp;

mod train;
pub use self::train::TrainApp;

mod traits;
pub use self::traits::RcConllApp;

mod vocab;
pub use self::vocab::VocabApp;
