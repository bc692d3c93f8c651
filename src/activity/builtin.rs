/// Built-in activity kinds
///
/// The explicit registration list the host passes to the registry at startup.
/// Hosts extend it with their own declarations or a manifest file.

use crate::activity::types::{ActivityKindDeclaration, PropertyDeclaration, PropertyType};
use serde_json::json;

/// Declarations for every activity kind shipped with the crate
pub fn builtin_declarations() -> Vec<ActivityKindDeclaration> {
    vec![
        ActivityKindDeclaration::new("core.start", "Primitives")
            .description("Entry point of a workflow")
            .output("done"),
        ActivityKindDeclaration::new("core.end", "Primitives")
            .description("Marks the workflow as finished")
            .input("in"),
        ActivityKindDeclaration::new("core.log", "Primitives")
            .description("Writes a message to the workflow journal")
            .input("in")
            .output("done")
            .property(PropertyDeclaration::new("message", PropertyType::String).expressions())
            .property(
                PropertyDeclaration::new("level", PropertyType::String)
                    .default_literal(json!("info"))
                    .options("log.levels"),
            )
            .property(
                PropertyDeclaration::new("source", PropertyType::String)
                    .default_computed("activity.kind"),
            ),
        ActivityKindDeclaration::new("core.delay", "Scheduling")
            .description("Suspends the branch for a fixed duration")
            .input("in")
            .output("done")
            .property(
                PropertyDeclaration::new("duration_ms", PropertyType::Integer)
                    .expressions()
                    .default_literal(json!(1000)),
            ),
        ActivityKindDeclaration::new("core.set_variable", "Primitives")
            .description("Assigns a value to a workflow variable")
            .input("in")
            .output("done")
            .property(PropertyDeclaration::new("variable", PropertyType::String))
            .property(PropertyDeclaration::new("value", PropertyType::Any).expressions()),
        ActivityKindDeclaration::new("http.request", "HTTP")
            .display_name("HTTP Request")
            .description("Sends an HTTP request and exposes the response")
            .input("in")
            .output("done")
            .property(
                PropertyDeclaration::new("url", PropertyType::String)
                    .expressions()
                    .describe("Absolute request URL"),
            )
            .property(
                PropertyDeclaration::new("method", PropertyType::String)
                    .default_literal(json!("GET"))
                    .options("http.methods"),
            )
            .property(
                PropertyDeclaration::new("headers", PropertyType::Object)
                    .expressions()
                    .default_computed("empty.object"),
            ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityRegistry;

    #[test]
    fn builtins_populate_cleanly() {
        let registry = ActivityRegistry::default();
        registry.populate(builtin_declarations()).unwrap();

        let http = registry.get("http.request").unwrap();
        assert_eq!(http.display_name, "HTTP Request");
        assert_eq!(http.inputs.len() + http.outputs.len(), 2);
        assert_eq!(http.properties.len(), 3);
        assert_eq!(registry.list()[0].kind, "core.start");
    }
}
