//! Merging configured and programmatic middlewares into one ordered list.

use indexmap::IndexMap;
use tessera_config::MiddlewareEntry;

use crate::spec::MiddlewareSpec;

/// Which side wins when a name is declared both in configuration and in code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Precedence {
    /// The configuration entry is kept.
    #[default]
    ConfigFirst,
    /// The programmatic entry replaces it.
    ProgrammaticFirst,
}

/// Produces the mount order.
///
/// Names are unioned: configured entries in declaration order, then
/// programmatic-only entries in the order given. The union is then stably
/// sorted by `order`, so entries with equal order keep that relative order.
///
/// ```
/// use indexmap::IndexMap;
/// use tessera_middleware::{MiddlewareAssembler, MiddlewareSpec};
///
/// let specs = MiddlewareAssembler::new().assemble_specs(
///     vec![MiddlewareSpec::new("static", "static").order(10.0)],
///     vec![MiddlewareSpec::new("auth", "auth").order(1.0)],
/// );
/// let names: Vec<_> = specs.iter().map(MiddlewareSpec::name).collect();
/// assert_eq!(names, ["auth", "static"]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MiddlewareAssembler {
    precedence: Precedence,
}

impl MiddlewareAssembler {
    /// An assembler with [`Precedence::ConfigFirst`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the collision rule.
    #[must_use]
    pub fn precedence(mut self, precedence: Precedence) -> Self {
        self.precedence = precedence;
        self
    }

    /// Assembles from the `middlewares` section and programmatic specs.
    pub fn assemble<I>(&self, configured: &IndexMap<String, MiddlewareEntry>, additional: I) -> Vec<MiddlewareSpec>
    where
        I: IntoIterator<Item = MiddlewareSpec>,
    {
        let configured: Vec<MiddlewareSpec> = configured
            .iter()
            .map(|(name, entry)| MiddlewareSpec::from_entry(name, entry))
            .collect();
        self.assemble_specs(configured, additional)
    }

    /// Assembles from two lists of specs.
    pub fn assemble_specs<C, I>(&self, configured: C, additional: I) -> Vec<MiddlewareSpec>
    where
        C: IntoIterator<Item = MiddlewareSpec>,
        I: IntoIterator<Item = MiddlewareSpec>,
    {
        let mut union: IndexMap<String, MiddlewareSpec> = configured
            .into_iter()
            .map(|spec| (spec.name().to_string(), spec))
            .collect();
        let configured_len = union.len();

        for spec in additional {
            match union.get_index_of(spec.name()) {
                Some(index) if index < configured_len => {
                    tracing::debug!(
                        name = spec.name(),
                        precedence = ?self.precedence,
                        "middleware declared in configuration and in code"
                    );
                    if self.precedence == Precedence::ProgrammaticFirst {
                        union[index] = spec;
                    }
                }
                // a later programmatic entry replaces an earlier one in place
                _ => {
                    union.insert(spec.name().to_string(), spec);
                }
            }
        }

        let mut specs: Vec<MiddlewareSpec> = union.into_values().collect();
        specs.sort_by(|a, b| a.order_value().total_cmp(&b.order_value()));
        specs
    }
}
