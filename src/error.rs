use thiserror::Error;

use crate::metadata::token::Token;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every variant is fatal: a weave either completes for the whole module or is aborted before
/// the caller's module is touched. Variants that stem from a user declaration carry the full
/// name and the metadata token of the responsible method, so that an external diagnostics
/// layer can map them back to file and line information.
///
/// # Error Categories
///
/// ## Declaration Errors
/// - [`Error::SignatureMismatch`] - Advice return type or argument source violates its injection point contract
/// - [`Error::UnboundArgument`] - Advice parameter without a usable source binding
/// - [`Error::AmbiguousAbort`] - More than one abort-capable advice on a single target
/// - [`Error::AspectNotFound`] - Aspect annotation references an unknown type
/// - [`Error::InvalidNameFilter`] - Name filter is not a valid regular expression
/// - [`Error::MissingAspectConstructor`] - Aspect can not be instantiated
/// - [`Error::InvalidDeclaration`] - Annotation arguments have an unexpected shape
///
/// ## Graph Errors
/// - [`Error::Malformed`] - Internal inconsistency of the metadata graph
/// - [`Error::MethodNotFound`] / [`Error::TypeNotFound`] - Dangling identifiers
///
/// # Examples
///
/// ```rust,no_run
/// use dotweave::{Error, Weaver, metadata::Module};
///
/// let mut module = Module::new("Sample.dll");
/// match Weaver::default().weave(&mut module) {
///     Ok(summary) => println!("{summary}"),
///     Err(Error::AmbiguousAbort { method, token }) => {
///         eprintln!("{method} ({token}) has more than one aborting advice");
///     }
///     Err(e) => eprintln!("weaving failed: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The graph handed to the weaver is internally inconsistent.
    ///
    /// The error includes the source location where the inconsistency was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An advice method's return type or an argument source does not satisfy the rules of its
    /// injection point.
    #[error("{message} - {method} ({token})")]
    SignatureMismatch {
        /// Description of the violated rule
        message: String,
        /// Full name of the offending method
        method: String,
        /// Token of the offending method
        token: Token,
    },

    /// An advice parameter is not bound to a source, or its type does not fit the source.
    #[error("{message} - {method} ({token})")]
    UnboundArgument {
        /// Description of the binding problem
        message: String,
        /// Full name of the advice method
        method: String,
        /// Token of the advice method
        token: Token,
    },

    /// More than one advice with an abort flag binding applies to the same target.
    #[error("Method may have only one advice with an AbortFlag argument applied to it - {method} ({token})")]
    AmbiguousAbort {
        /// Full name of the target method
        method: String,
        /// Token of the target method
        token: Token,
    },

    /// An aspect annotation names a type that is not defined in the module.
    #[error("Aspect type '{name}' referenced by {owner} could not be found")]
    AspectNotFound {
        /// The aspect type name as written in the annotation
        name: String,
        /// Full name of the annotated class or member
        owner: String,
    },

    /// A name filter could not be compiled into a regular expression.
    #[error("Invalid name filter '{pattern}' on {owner}: {source}")]
    InvalidNameFilter {
        /// The rejected pattern
        pattern: String,
        /// Full name of the annotated class or member
        owner: String,
        /// The underlying regex error
        #[source]
        source: regex::Error,
    },

    /// The aspect type has instance advices but no parameterless instance constructor.
    #[error("Aspect type '{aspect}' needs a parameterless constructor")]
    MissingAspectConstructor {
        /// Full name of the aspect type
        aspect: String,
    },

    /// An annotation carries arguments of an unexpected kind or value.
    #[error("{message} - {owner}")]
    InvalidDeclaration {
        /// Description of the problem
        message: String,
        /// Full name of the annotated element
        owner: String,
    },

    /// A method identifier does not resolve in the module.
    #[error("Failed to find method - {0}")]
    MethodNotFound(usize),

    /// A type identifier does not resolve in the module.
    #[error("Failed to find type - {0}")]
    TypeNotFound(usize),
}

impl Error {
    /// Returns the token of the method responsible for this error, if the error names one.
    #[must_use]
    pub fn method_token(&self) -> Option<Token> {
        match self {
            Error::SignatureMismatch { token, .. }
            | Error::UnboundArgument { token, .. }
            | Error::AmbiguousAbort { token, .. } => Some(*token),
            _ => None,
        }
    }
}
