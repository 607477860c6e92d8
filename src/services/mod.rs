pub mod markup_normalizer;
pub mod result_presenter;
pub mod row_store;

pub use markup_normalizer::{classify, normalize, Classification, CommandKind};
pub use result_presenter::{Badge, DisplayModel, RenderPath, ResultPresenter, Separator};
pub use row_store::RowStore;
