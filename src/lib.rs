pub mod cli;
pub mod compiler;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod external;
pub mod helpers;
pub mod lint;
pub mod result;

pub use compiler::EmbedTypeScript;
pub use config::{CompilerOptions, EmbedProps, ExternalSet, HostEnvironment, InputSet};
pub use diagnostic::Diagnostic;
pub use lint::{EmbedLint, LintRules};
pub use result::{CompileResult, ExceptionError, TransformResult};
