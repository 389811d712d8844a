// ABOUTME: ASCII architecture view of a loaded program

use crate::loader::Program;
use std::collections::BTreeMap;

/// Render the building/floor/step tree, with parameter lists and riser
/// names. Bundled stdlib steps are left out - they are part of the
/// language, not of the project being pictured.
pub fn render(program: &Program) -> String {
    let mut floors: BTreeMap<&str, Vec<&crate::ast::Step>> = BTreeMap::new();
    for step in program.registry.all_steps() {
        if program.registry.is_stdlib(&step.name) {
            continue;
        }
        floors.entry(step.floor.as_str()).or_default().push(step);
    }
    for steps in floors.values_mut() {
        steps.sort_by(|a, b| a.name.cmp(&b.name));
    }

    let mut out = format!("building: {}\n", program.building.name);
    let floor_count = floors.len();
    for (floor_index, (floor, steps)) in floors.iter().enumerate() {
        let last_floor = floor_index + 1 == floor_count;
        out.push_str(&format!(
            "{} floor: {}\n",
            if last_floor { "└──" } else { "├──" },
            floor
        ));
        let trunk = if last_floor { "    " } else { "│   " };
        for (step_index, step) in steps.iter().enumerate() {
            let last_step = step_index + 1 == steps.len();
            out.push_str(&format!(
                "{}{} step: {}{}{}\n",
                trunk,
                if last_step { "└──" } else { "├──" },
                step.name,
                signature(&step.params),
                step.returns
                    .as_deref()
                    .map(|r| format!(" -> {}", r))
                    .unwrap_or_default()
            ));
            let step_trunk = if last_step { "    " } else { "│   " };
            for (riser_index, riser) in step.risers.iter().enumerate() {
                let last_riser = riser_index + 1 == step.risers.len();
                out.push_str(&format!(
                    "{}{}{} riser: {}{}\n",
                    trunk,
                    step_trunk,
                    if last_riser { "└──" } else { "├──" },
                    riser.name,
                    signature(&riser.params)
                ));
            }
        }
    }
    out
}

fn signature(params: &[String]) -> String {
    if params.is_empty() {
        String::new()
    } else {
        format!(" ({})", params.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Building, Riser, Step};
    use crate::location::SourceLocation;
    use crate::registry::Registry;
    use std::path::PathBuf;
    use std::rc::Rc;

    #[test]
    fn test_render_tree() {
        let mut registry = Registry::new();
        registry
            .register_step(Rc::new(Step {
                name: "mix".to_string(),
                floor: "kitchen".to_string(),
                params: vec!["a".to_string(), "b".to_string()],
                returns: Some("blend".to_string()),
                declares: Vec::new(),
                risers: vec![Riser {
                    name: "fold".to_string(),
                    params: Vec::new(),
                    returns: None,
                    declares: Vec::new(),
                    body: Vec::new(),
                    location: SourceLocation::synthetic(),
                }],
                body: Vec::new(),
                location: SourceLocation::synthetic(),
            }))
            .unwrap();
        let program = Program {
            building: Building {
                name: "bakery".to_string(),
                declares: Vec::new(),
                body: Vec::new(),
                location: SourceLocation::synthetic(),
            },
            registry,
            root: PathBuf::from("."),
        };
        let rendered = render(&program);
        assert!(rendered.starts_with("building: bakery\n"));
        assert!(rendered.contains("└── floor: kitchen"));
        assert!(rendered.contains("└── step: mix (a, b) -> blend"));
        assert!(rendered.contains("riser: fold"));
    }
}
