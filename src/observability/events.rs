//! Observable events for aerotype
//!
//! Events are explicit and typed. The resolution core emits none; only the
//! loader and the CLI log.

use std::fmt;

use super::logger::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration loaded
    ConfigLoaded,

    // Definitions
    /// One definition file declared
    HierarchyLoaded,
    /// All definition files declared
    HierarchiesLoaded,
    /// A definition file could not be declared (FATAL)
    HierarchyRejected,

    // Resolution
    /// Input resolved to a variant
    ResolveAccepted,
    /// Input rejected by every variant
    ResolveRejected,
    /// Input line is not JSON
    RequestMalformed,
    /// Resolution hit a mis-declared node
    ResolveDeclarationFault,
    /// Input stream exhausted
    ResolveComplete,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::HierarchyLoaded => "HIERARCHY_LOADED",
            Event::HierarchiesLoaded => "HIERARCHIES_LOADED",
            Event::HierarchyRejected => "HIERARCHY_REJECTED",

            Event::ResolveAccepted => "RESOLVE_ACCEPTED",
            Event::ResolveRejected => "RESOLVE_REJECTED",
            Event::RequestMalformed => "REQUEST_MALFORMED",
            Event::ResolveDeclarationFault => "RESOLVE_DECLARATION_FAULT",
            Event::ResolveComplete => "RESOLVE_COMPLETE",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::ResolveAccepted | Event::ResolveRejected => Severity::Trace,
            Event::RequestMalformed => Severity::Warn,
            Event::ResolveDeclarationFault => Severity::Error,
            Event::HierarchyRejected => Severity::Fatal,
            _ => Severity::Info,
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::ConfigLoaded,
            Event::HierarchyLoaded,
            Event::HierarchiesLoaded,
            Event::HierarchyRejected,
            Event::ResolveAccepted,
            Event::ResolveRejected,
            Event::RequestMalformed,
            Event::ResolveDeclarationFault,
            Event::ResolveComplete,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_fatal_events() {
        assert!(Event::HierarchyRejected.is_fatal());
        assert!(!Event::HierarchyLoaded.is_fatal());
        assert!(!Event::ResolveDeclarationFault.is_fatal());
    }

    #[test]
    fn test_per_input_events_are_trace() {
        assert_eq!(Event::ResolveAccepted.severity(), Severity::Trace);
        assert_eq!(Event::ResolveRejected.severity(), Severity::Trace);
    }
}
