// ABOUTME: Diagnostics accumulator for non-fatal findings during offline planning.
// ABOUTME: Collects warnings that shouldn't fail a command but should be shown to users.

/// Collects non-fatal warnings during a command.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A non-fatal warning.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// Updated or deleted resources ignored because the import was forced.
    pub fn ignored_changes(resources: &[String]) -> Self {
        Self {
            kind: WarningKind::IgnoredChanges,
            message: format!(
                "Ignoring updated/deleted resources (--force): {}",
                resources.join(", ")
            ),
        }
    }

    /// An import candidate the mapping file has no identifier for.
    pub fn skipped_resource(logical_id: &str) -> Self {
        Self {
            kind: WarningKind::SkippedResource,
            message: format!("{logical_id}: skipping"),
        }
    }

    /// Mapping entries that match no import candidate.
    pub fn unrecognized_mapping(logical_ids: &[String]) -> Self {
        Self {
            kind: WarningKind::UnrecognizedMapping,
            message: format!(
                "Unrecognized resource identifiers in mapping file: {}",
                logical_ids.join(", ")
            ),
        }
    }

    /// A supplied parameter the template does not declare.
    pub fn undeclared_parameter(name: &str) -> Self {
        Self {
            kind: WarningKind::UndeclaredParameter,
            message: format!("{name}: not declared by the template, passed through as-is"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    IgnoredChanges,
    SkippedResource,
    UnrecognizedMapping,
    UndeclaredParameter,
}
