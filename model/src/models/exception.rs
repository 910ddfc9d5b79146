use std::backtrace::{Backtrace, BacktraceStatus};

use serde::{Deserialize, Serialize};

/// One error in a captured chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionRecord {
    pub type_name: String,
    pub message: String,
    pub stack_trace: Option<String>,
    /// Index of the wrapped cause inside the owning [`ExceptionChain`].
    pub inner: Option<usize>,
}

/// An error and its causes, outermost at index 0.
///
/// Causes are linked by index so that several records may point at the same
/// cause, or back at an earlier one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionChain {
    pub errors: Vec<ExceptionRecord>,
}

impl ExceptionChain {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        ExceptionChain {
            errors: vec![ExceptionRecord {
                type_name: type_name.into(),
                message: message.into(),
                stack_trace: None,
                inner: None,
            }],
        }
    }

    /// Appends a cause below the current innermost record.
    pub fn caused_by(mut self, type_name: impl Into<String>, message: impl Into<String>) -> Self {
        let index = self.errors.len();
        if let Some(last) = self.errors.last_mut() {
            last.inner = Some(index);
        }
        self.errors.push(ExceptionRecord {
            type_name: type_name.into(),
            message: message.into(),
            stack_trace: None,
            inner: None,
        });
        self
    }

    /// Captures `err` and every `source()` below it.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let backtrace = Backtrace::capture();
        let mut chain = ExceptionChain::new(type_name_of(err), err.to_string());
        if backtrace.status() == BacktraceStatus::Captured {
            chain.errors[0].stack_trace = Some(backtrace.to_string());
        }

        let mut source = err.source();
        while let Some(cause) = source {
            chain = chain.caused_by(type_name_of(cause), cause.to_string());
            source = cause.source();
        }
        chain
    }

    pub fn root(&self) -> Option<&ExceptionRecord> {
        self.errors.first()
    }

    pub fn get(&self, index: usize) -> Option<&ExceptionRecord> {
        self.errors.get(index)
    }
}

// Debug output of an error starts with its variant or struct name.
fn type_name_of(err: &dyn std::error::Error) -> String {
    let debug = format!("{:?}", err);
    let name: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
        .collect();
    if name.is_empty() {
        "Error".to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "connection refused")
        }
    }

    impl std::error::Error for Inner {}

    #[derive(Debug)]
    struct Outer {
        cause: Inner,
    }

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "order lookup failed")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.cause)
        }
    }

    #[test]
    fn from_error_walks_sources() {
        let err = Outer { cause: Inner };
        let chain = ExceptionChain::from_error(&err);

        assert_eq!(chain.errors.len(), 2);
        assert_eq!(chain.errors[0].type_name, "Outer");
        assert_eq!(chain.errors[0].message, "order lookup failed");
        assert_eq!(chain.errors[0].inner, Some(1));
        assert_eq!(chain.errors[1].type_name, "Inner");
        assert_eq!(chain.errors[1].inner, None);
    }

    #[test]
    fn caused_by_links_innermost() {
        let chain = ExceptionChain::new("A", "a")
            .caused_by("B", "b")
            .caused_by("C", "c");
        assert_eq!(chain.get(0).and_then(|e| e.inner), Some(1));
        assert_eq!(chain.get(1).and_then(|e| e.inner), Some(2));
        assert_eq!(chain.get(2).and_then(|e| e.inner), None);
    }
}
