//! `inject-generated-files`: write generated contents verbatim.
//!
//! Runs after the static copy, so a generated file replaces a static file at
//! the same path.

use std::fs;

use anyhow::{Context, Result};

use crate::pipeline::{PipelineConfig, StageError, StageKind};

pub fn run(config: &PipelineConfig) -> Result<usize> {
    let output = config.output();
    for file in config.generated_files() {
        let dest = file.destination(output).ok_or_else(|| {
            StageError::new(
                StageKind::InjectGeneratedFiles,
                format!("generated file `{}` escapes the output directory", file.path),
            )
        })?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&dest, &file.content)
            .with_context(|| format!("failed to write {}", dest.display()))?;
    }
    Ok(config.generated_files().len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GeneratedFile, ModeProfile};
    use crate::pipeline::{BuildInputs, PipelineAssembler};
    use crate::stages::testing::write_site;

    fn production(root: &std::path::Path, files: Vec<GeneratedFile>) -> PipelineConfig {
        PipelineAssembler::new(BuildInputs::for_tests(root), ModeProfile::production(files))
            .assemble()
            .unwrap()
    }

    #[test]
    fn test_writes_files_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        write_site(dir.path());
        let config = production(
            dir.path(),
            vec![
                GeneratedFile::new("content.txt", "hello\n"),
                GeneratedFile::new("data/posts.json", "[]"),
            ],
        );

        assert_eq!(run(&config).unwrap(), 2);
        let out = config.output();
        assert_eq!(fs::read_to_string(out.join("content.txt")).unwrap(), "hello\n");
        assert_eq!(fs::read_to_string(out.join("data/posts.json")).unwrap(), "[]");
    }

    #[test]
    fn test_escaping_path_is_a_stage_error() {
        let dir = tempfile::tempdir().unwrap();
        write_site(dir.path());
        let config = production(dir.path(), vec![GeneratedFile::new("../evil.txt", "x")]);

        let err = run(&config).unwrap_err();
        let err = StageError::from_error(StageKind::InjectGeneratedFiles, err);
        assert!(err.message.contains("escapes"));
        assert!(!dir.path().join("evil.txt").exists());
    }
}
