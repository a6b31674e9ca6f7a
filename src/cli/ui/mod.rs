mod decode_view;
mod listen_view;
mod painter;
mod reading_view;
mod table;

pub(crate) use self::decode_view::DecodeView;
pub(crate) use self::listen_view::{ListenStartView, ListenSummaryView};
pub(crate) use self::painter::Painter;
pub(crate) use self::reading_view::{ReadingView, ResultView};
