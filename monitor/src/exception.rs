use std::collections::HashSet;
use std::fmt::Write;
use std::sync::Arc;

use model::{ExceptionChain, ExceptionRecord};

/// Extra text appended to every rendered chain. Blank output is ignored.
pub type ExceptionAppendHook = Arc<dyn Fn(&ExceptionChain) -> Option<String> + Send + Sync>;

pub const BASE_EXCEPTION_LABEL: &str = "Base Exception:";

#[derive(Clone, Default)]
pub struct ExceptionFormatter {
    append_hook: Option<ExceptionAppendHook>,
}

impl std::fmt::Debug for ExceptionFormatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExceptionFormatter")
            .field("append_hook", &self.append_hook.is_some())
            .finish()
    }
}

impl ExceptionFormatter {
    pub fn new(append_hook: Option<ExceptionAppendHook>) -> Self {
        Self { append_hook }
    }

    /// Renders the outermost error with its causes, then the innermost
    /// cause under [`BASE_EXCEPTION_LABEL`]. Each record is written at most
    /// once, so shared or circular cause links terminate.
    pub fn format(&self, chain: &ExceptionChain) -> String {
        let mut out = String::new();
        let Some(root) = chain.root() else {
            return out;
        };
        render(chain, 0, root, &mut out);

        let base = base_index(chain, 0);
        if base != 0 {
            if let Some(record) = chain.get(base) {
                let _ = write!(out, "\n\n{}\n", BASE_EXCEPTION_LABEL);
                render(chain, base, record, &mut out);
            }
        }

        if let Some(hook) = &self.append_hook {
            if let Some(extra) = hook(chain).filter(|s| !s.trim().is_empty()) {
                out.push_str("\n\n");
                out.push_str(extra.trim_end());
            }
        }
        out
    }
}

/// Innermost distinct record reachable from `index`.
fn base_index(chain: &ExceptionChain, index: usize) -> usize {
    let mut seen = HashSet::from([index]);
    let mut current = index;
    while let Some(next) = chain.get(current).and_then(|r| r.inner) {
        if chain.get(next).is_none() || !seen.insert(next) {
            break;
        }
        current = next;
    }
    current
}

fn render(chain: &ExceptionChain, index: usize, record: &ExceptionRecord, out: &mut String) {
    let _ = write!(out, "{}: {}", record.type_name, record.message);

    let mut seen = HashSet::from([index]);
    let mut inner = record.inner;
    while let Some(next) = inner {
        if !seen.insert(next) {
            break;
        }
        let Some(cause) = chain.get(next) else {
            break;
        };
        let _ = write!(out, "\n ---> {}: {}", cause.type_name, cause.message);
        inner = cause.inner;
    }

    if let Some(trace) = record.stack_trace.as_deref().filter(|t| !t.trim().is_empty()) {
        let _ = write!(out, "\n{}", trace.trim_end());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_levels() -> ExceptionChain {
        ExceptionChain::new("OuterError", "outer")
            .caused_by("MiddleError", "middle")
            .caused_by("InnerError", "innermost")
    }

    #[test]
    fn two_level_chain_has_outer_and_base() {
        let chain = ExceptionChain::new("OuterError", "outer").caused_by("BaseError", "base");
        let text = ExceptionFormatter::default().format(&chain);

        assert!(text.starts_with("OuterError: outer"));
        assert!(text.contains(" ---> BaseError: base"));
        assert_eq!(text.matches(BASE_EXCEPTION_LABEL).count(), 1);
        let base_section = text.split(BASE_EXCEPTION_LABEL).nth(1).unwrap();
        assert!(base_section.contains("BaseError: base"));
    }

    #[test]
    fn single_error_has_no_base_section() {
        let chain = ExceptionChain::new("OnlyError", "alone");
        let text = ExceptionFormatter::default().format(&chain);
        assert_eq!(text, "OnlyError: alone");
    }

    #[test]
    fn three_levels_render_one_base_section() {
        let text = ExceptionFormatter::default().format(&three_levels());
        assert_eq!(text.matches(BASE_EXCEPTION_LABEL).count(), 1);
        let base_section = text.split(BASE_EXCEPTION_LABEL).nth(1).unwrap();
        assert!(base_section.contains("InnerError: innermost"));
        assert!(!base_section.contains("MiddleError"));
    }

    #[test]
    fn circular_inner_links_terminate() {
        let mut chain = three_levels();
        // innermost points back at the middle record
        chain.errors[2].inner = Some(1);

        let text = ExceptionFormatter::default().format(&chain);
        assert_eq!(text.matches(BASE_EXCEPTION_LABEL).count(), 1);
        assert_eq!(text.matches("OuterError: outer").count(), 1);
        let base_section = text.split(BASE_EXCEPTION_LABEL).nth(1).unwrap();
        assert!(base_section.contains("InnerError: innermost"));
    }

    #[test]
    fn self_reference_terminates() {
        let mut chain = ExceptionChain::new("LoopError", "loop");
        chain.errors[0].inner = Some(0);
        let text = ExceptionFormatter::default().format(&chain);
        assert_eq!(text, "LoopError: loop");
    }

    #[test]
    fn hook_output_is_appended_when_not_blank() {
        let hook: ExceptionAppendHook = Arc::new(|chain: &ExceptionChain| {
            Some(format!("Environment: test ({} errors)", chain.errors.len()))
        });
        let text = ExceptionFormatter::new(Some(hook)).format(&three_levels());
        assert!(text.ends_with("Environment: test (3 errors)"));
    }

    #[test]
    fn blank_hook_output_is_ignored() {
        let hook: ExceptionAppendHook = Arc::new(|_: &ExceptionChain| Some("   \n".to_string()));
        let plain = ExceptionFormatter::default().format(&three_levels());
        let hooked = ExceptionFormatter::new(Some(hook)).format(&three_levels());
        assert_eq!(plain, hooked);
    }

    #[test]
    fn stack_trace_follows_message() {
        let mut chain = ExceptionChain::new("OuterError", "outer");
        chain.errors[0].stack_trace = Some("   at handlers::orders::get".into());
        let text = ExceptionFormatter::default().format(&chain);
        assert_eq!(text, "OuterError: outer\n   at handlers::orders::get");
    }
}
