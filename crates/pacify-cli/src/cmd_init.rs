// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `pacify init` command.

use std::path::PathBuf;

use clap::Args;
use miette::Result;
use pacify::{FileSpec, MarkerSpec, PropertySpec};

/// Marker file name written by `init`.
const MARKER_FILENAME: &str = ".pacify.yaml";

/// Create a new .pacify.yaml marker file
#[derive(Debug, Args)]
pub struct CmdInit {
    /// Directory to create file in
    #[clap(default_value = ".")]
    path: PathBuf,

    /// Begin token of placeholders
    #[clap(long, default_value = "%{")]
    begin_token: String,

    /// End token of placeholders
    #[clap(long, default_value = "}")]
    end_token: String,

    /// Declare a target file, as PATH or PATH=PROP1,PROP2
    #[clap(long = "file")]
    files: Vec<String>,

    /// Template to use: minimal, standard
    #[clap(long, default_value = "standard")]
    template: String,
}

impl CmdInit {
    pub fn run(&mut self) -> Result<i32> {
        let marker_path = self.path.join(MARKER_FILENAME);

        if marker_path.exists() {
            return Err(miette::miette!(
                "{MARKER_FILENAME} already exists at {:?}",
                marker_path
            ));
        }

        let content = match self.template.as_str() {
            "minimal" => self.generate_minimal_template()?,
            _ => self.generate_standard_template()?,
        };

        std::fs::write(&marker_path, content)
            .map_err(|e| miette::miette!("Failed to write {MARKER_FILENAME}: {}", e))?;

        println!("Created {MARKER_FILENAME} at {:?}", marker_path);
        println!();
        println!("Next steps:");
        println!("  1. Declare the files and properties of the package");
        println!("  2. Run 'pacify show' to review the declarations");
        println!("  3. Run 'pacify validate -D cmdline.<property>=<value>' to check it");

        Ok(0)
    }

    fn marker(&self) -> MarkerSpec {
        MarkerSpec {
            begin_token: Some(self.begin_token.clone()),
            end_token: Some(self.end_token.clone()),
            files: self.files.iter().map(|f| parse_file(f)).collect(),
            ..Default::default()
        }
    }

    fn generate_minimal_template(&self) -> Result<String> {
        Ok(self.marker().to_yaml()?)
    }

    fn generate_standard_template(&self) -> Result<String> {
        let declared = self.marker().to_yaml()?;
        Ok(format!(
            "# pacify marker file\n\
            # Paths are relative to the directory of this file.\n\
            \n\
            {declared}\
            \n\
            # files:\n\
            #   - path: conf/app.properties\n\
            #     filter: properties        # skip comment lines\n\
            #     properties:\n\
            #       - name: dbHost\n\
            #       - name: logLevel\n\
            #         default: INFO\n\
            #       - name: jdbcUrl\n\
            #         regex: true\n\
            #         pattern: \"jdbc:h2:mem:\\\\w+\"\n\
            \n\
            # archives:\n\
            #   - path: lib/app.ear\n\
            #     type: ear                 # jar, war, ear, zip or tar\n\
            #     files:\n\
            #       - path: META-INF/application.xml\n\
            #         properties:\n\
            #           - name: contextRoot\n\
            #     archives:\n\
            #       - path: lib/core.jar\n\
            #         type: jar\n"
        ))
    }
}

/// `conf/app.properties=dbHost,dbPort` declares a file with two properties.
fn parse_file(value: &str) -> FileSpec {
    let (path, properties) = value.split_once('=').unwrap_or((value, ""));
    FileSpec {
        path: path.trim().to_string(),
        begin_token: None,
        end_token: None,
        filter: None,
        properties: properties
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PropertySpec::new)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("conf/app.properties", "conf/app.properties", &[])]
    #[case("app.properties=dbHost", "app.properties", &["dbHost"])]
    #[case("app.properties= dbHost, dbPort,", "app.properties", &["dbHost", "dbPort"])]
    fn test_parse_file(#[case] value: &str, #[case] path: &str, #[case] properties: &[&str]) {
        let file = parse_file(value);
        assert_eq!(file.path, path);
        let names: Vec<_> = file.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, properties);
    }

    #[rstest]
    fn test_templates_parse_back() {
        let cmd = CmdInit {
            path: PathBuf::from("."),
            begin_token: "@@".into(),
            end_token: "@@".into(),
            files: vec!["app.properties=dbHost".into()],
            template: "standard".into(),
        };
        for yaml in [
            cmd.generate_minimal_template().unwrap(),
            cmd.generate_standard_template().unwrap(),
        ] {
            let spec = MarkerSpec::from_yaml(yaml).unwrap();
            assert_eq!(spec.begin_token.as_deref(), Some("@@"));
            assert_eq!(spec.files.len(), 1);
            assert_eq!(spec.files[0].properties[0].name, "dbHost");
        }
    }
}
