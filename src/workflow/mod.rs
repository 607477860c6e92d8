pub mod evaluation_ctx;
pub mod evaluation_pipeline;
pub mod row_controller;

pub use evaluation_ctx::EvaluationTicket;
pub use evaluation_pipeline::{EvaluationOutcome, EvaluationPipeline};
pub use row_controller::{MenuAction, MenuEffect, RowController, SubmitOutcome};
