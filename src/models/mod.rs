pub mod engine_result;
pub mod memory;
pub mod row;

pub use engine_result::{EngineResult, ResultKind};
pub use memory::{Ack, CalculatorMemory, FunctionBinding, SessionSnapshot};
pub use row::{DisplayMode, EditPhase, EvaluationEvent, EvaluationState, Row, RowId, RowMode};
