// ABOUTME: Project discovery: find, parse, cross-check, and register files

use crate::ast::Building;
use crate::error::{codes, StepsError};
use crate::natives;
use crate::parser;
use crate::registry::Registry;
use crate::stdlib;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// A fully loaded program: the building AST plus the populated registries.
pub struct Program {
    pub building: Building,
    pub registry: Registry,
    /// Project directory; the file natives are sandboxed here.
    pub root: PathBuf,
}

/// What the loader hands back. `program` may be present even when `errors`
/// is not empty, for diagnostic callers; execution must refuse to start
/// unless `errors` is empty.
pub struct LoadResult {
    pub program: Option<Program>,
    pub errors: Vec<StepsError>,
}

impl LoadResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Load a project directory: stdlib first, then natives, then every
/// floor/step under the root, with the cross-checks of names against files.
/// No Steps code runs here.
pub fn load_project(root: &Path) -> LoadResult {
    let mut errors = Vec::new();
    let mut registry = Registry::new();

    errors.extend(stdlib::load_into(&mut registry));
    natives::register_natives(&mut registry.natives);

    let root_name = match project_name(root) {
        Ok(name) => name,
        Err(e) => {
            return LoadResult {
                program: None,
                errors: vec![e],
            }
        }
    };

    // 1. The building file must exist and carry the directory's name.
    let building_path = root.join(format!("{}.building", root_name));
    let building = match std::fs::read_to_string(&building_path) {
        Ok(source) => {
            let (building, mut parse_errors) =
                parser::parse_building(&source, &relative_name(&building_path, root));
            errors.append(&mut parse_errors);
            if let Some(b) = &building {
                if b.name != root_name {
                    errors.push(
                        StepsError::structure(
                            codes::MISSING_BUILDING,
                            format!(
                                "the building is named `{}` but the directory is `{}`",
                                b.name, root_name
                            ),
                        )
                        .at(b.location.clone())
                        .with_hint("the building name must match its directory"),
                    );
                }
            }
            building
        }
        Err(_) => {
            errors.push(
                StepsError::structure(
                    codes::MISSING_BUILDING,
                    format!("`{}` not found", building_path.display()),
                )
                .with_hint(format!(
                    "a project needs exactly one `{}.building` at its root",
                    root_name
                )),
            );
            None
        }
    };

    // 2-4. Floors and their steps.
    for dir in subdirectories(root) {
        load_floor(&dir, root, &mut registry, &mut errors);
    }

    log::debug!(
        "loaded project `{}`: {} steps, {} natives, {} errors",
        root_name,
        registry.step_count(),
        registry.natives.len(),
        errors.len()
    );

    LoadResult {
        program: building.map(|building| Program {
            building,
            registry,
            root: root.to_path_buf(),
        }),
        errors,
    }
}

fn load_floor(dir: &Path, root: &Path, registry: &mut Registry, errors: &mut Vec<StepsError>) {
    let dir_name = match dir.file_name().and_then(|n| n.to_str()) {
        Some(name) => name.to_string(),
        None => return,
    };

    let floor_path = dir.join(format!("{}.floor", dir_name));
    let source = match std::fs::read_to_string(&floor_path) {
        Ok(source) => source,
        Err(_) => {
            // Not every subdirectory is a floor (.git, build output, ...).
            log::debug!("`{}` has no floor file, skipping", dir.display());
            return;
        }
    };

    let (floor, mut parse_errors) = parser::parse_floor(&source, &relative_name(&floor_path, root));
    errors.append(&mut parse_errors);
    let floor = match floor {
        Some(floor) => floor,
        None => return,
    };

    if floor.name != dir_name {
        errors.push(
            StepsError::structure(
                codes::FLOOR_DECL_MISMATCH,
                format!(
                    "floor file declares `{}` but lives in directory `{}`",
                    floor.name, dir_name
                ),
            )
            .at(floor.location.clone()),
        );
    }

    let mut declared = HashSet::new();
    for decl in &floor.steps {
        declared.insert(format!("{}.step", decl.name));
        let step_path = dir.join(format!("{}.step", decl.name));
        let source = match std::fs::read_to_string(&step_path) {
            Ok(source) => source,
            Err(_) => {
                errors.push(
                    StepsError::structure(
                        codes::MISSING_STEP_FILE,
                        format!(
                            "floor `{}` declares step `{}` but `{}` is missing",
                            dir_name,
                            decl.name,
                            step_path.display()
                        ),
                    )
                    .at(decl.location.clone()),
                );
                continue;
            }
        };

        let (step, mut parse_errors) =
            parser::parse_step(&source, &relative_name(&step_path, root));
        errors.append(&mut parse_errors);
        let step = match step {
            Some(step) => step,
            None => continue,
        };

        if step.name != decl.name {
            errors.push(
                StepsError::structure(
                    codes::STEP_NAME_MISMATCH,
                    format!(
                        "`{}` contains step `{}`, expected `{}`",
                        step_path.display(),
                        step.name,
                        decl.name
                    ),
                )
                .at(step.location.clone()),
            );
            continue;
        }
        if step.floor != dir_name {
            errors.push(
                StepsError::structure(
                    codes::FLOOR_MISMATCH,
                    format!(
                        "step `{}` says `belongs to: {}` but lives on floor `{}`",
                        step.name, step.floor, dir_name
                    ),
                )
                .at(step.location.clone()),
            );
            continue;
        }

        if let Err(e) = registry.register_step(Rc::new(step)) {
            errors.push(e);
        }
    }

    // Step files nobody declared are worth a warning, not an error.
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.ends_with(".step") && !declared.contains(name.as_ref()) {
                log::warn!(
                    "`{}` is not declared in {}.floor and was not loaded",
                    entry.path().display(),
                    dir_name
                );
            }
        }
    }
}

fn project_name(root: &Path) -> Result<String, StepsError> {
    let canonical = root
        .canonicalize()
        .map_err(|_| {
            StepsError::structure(
                codes::MISSING_BUILDING,
                format!("project directory `{}` does not exist", root.display()),
            )
        })?;
    canonical
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .ok_or_else(|| {
            StepsError::structure(
                codes::MISSING_BUILDING,
                format!("cannot derive a project name from `{}`", root.display()),
            )
        })
}

fn subdirectories(root: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(root)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect()
        })
        .unwrap_or_default();
    dirs.sort();
    dirs
}

/// File names in diagnostics are relative to the project root.
fn relative_name(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}
