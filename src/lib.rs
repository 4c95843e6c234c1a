pub mod batch;
pub mod config;
pub mod error;
pub mod language;
pub mod translate;

pub use batch::{BatchPolicy, Payload};
pub use config::{AdapterOptions, Backend, Config};
pub use error::{Result, TranslateError};
pub use language::{Language, SourceLanguage};
pub use translate::{DirectionAware, Registry, Translator};
