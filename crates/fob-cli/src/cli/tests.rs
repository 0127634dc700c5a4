#[cfg(test)]
mod tests {
    use crate::cli::validation::{parse_global, parse_jobs};
    use crate::cli::{Cli, Command, Format, Loader};
    use clap::{Parser, ValueEnum};
    use std::path::PathBuf;

    #[test]
    fn test_parse_global_valid_identifiers() {
        assert_eq!(parse_global("MyLibrary"), Ok("MyLibrary".to_string()));
        assert_eq!(parse_global("_private"), Ok("_private".to_string()));
        assert_eq!(parse_global("$wasm"), Ok("$wasm".to_string()));
        assert_eq!(parse_global("lib123"), Ok("lib123".to_string()));
        assert_eq!(parse_global("My_Lib$123"), Ok("My_Lib$123".to_string()));
    }

    #[test]
    fn test_parse_global_invalid() {
        assert!(parse_global("123lib").is_err());
        assert!(parse_global("-lib").is_err());
        assert!(parse_global("my-lib").is_err());
        assert!(parse_global("my.lib").is_err());
        assert!(parse_global("my lib").is_err());
    }

    #[test]
    fn test_parse_global_empty() {
        let err = parse_global("").unwrap_err();
        assert_eq!(err, "Global name cannot be empty");
    }

    #[test]
    fn test_parse_jobs() {
        assert_eq!(parse_jobs("4"), Ok(4));
        assert!(parse_jobs("0").is_err());
        assert!(parse_jobs("-1").is_err());
        assert!(parse_jobs("many").is_err());
    }

    #[test]
    fn test_format_enum_values() {
        let formats: Vec<_> = Format::value_variants()
            .iter()
            .map(|v| v.to_possible_value().unwrap().get_name().to_string())
            .collect();
        assert_eq!(formats, vec!["esm", "cjs", "iife"]);
    }

    #[test]
    fn test_loader_enum_values() {
        let loaders: Vec<_> = Loader::value_variants()
            .iter()
            .map(|v| v.to_possible_value().unwrap().get_name().to_string())
            .collect();
        assert_eq!(loaders, vec!["fetch", "inline", "node"]);
    }

    #[test]
    fn test_cli_verbose_quiet_conflict() {
        let result = Cli::try_parse_from(["fob", "--verbose", "--quiet", "build"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_build_args_defaults() {
        let args = Cli::try_parse_from(["fob", "build"]).unwrap();

        let Command::Build(build) = args.command else {
            panic!("expected build command");
        };
        assert!(build.config.config.is_none());
        assert!(build.format.is_none());
        assert!(build.jobs.is_none());
        assert!(!build.sourcemap);
        assert!(!build.debug);
        assert!(!build.no_cache);
        assert!(!build.json);
    }

    #[test]
    fn test_build_args_overrides() {
        let args = Cli::try_parse_from([
            "fob",
            "build",
            "--config",
            "web/fob.toml",
            "--profile",
            "dev",
            "--out-dir",
            "public/wasm",
            "--format",
            "iife",
            "--global-name",
            "Engine",
            "--loader",
            "inline",
            "--sourcemap",
            "--debug",
            "--jobs",
            "3",
            "--no-cache",
        ])
        .unwrap();

        let Command::Build(build) = args.command else {
            panic!("expected build command");
        };
        assert_eq!(build.config.config, Some(PathBuf::from("web/fob.toml")));
        assert_eq!(build.config.profile.as_deref(), Some("dev"));
        assert_eq!(build.out_dir, Some(PathBuf::from("public/wasm")));
        assert_eq!(build.format, Some(Format::Iife));
        assert_eq!(build.global_name.as_deref(), Some("Engine"));
        assert_eq!(build.loader, Some(Loader::Inline));
        assert!(build.sourcemap && build.debug && build.no_cache);
        assert_eq!(build.jobs, Some(3));
    }

    #[test]
    fn test_build_rejects_zero_jobs() {
        assert!(Cli::try_parse_from(["fob", "build", "--jobs", "0"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Cli::try_parse_from(["fob", "check", "--no-color", "-v"]).unwrap();
        assert!(args.no_color);
        assert!(args.verbose);
        assert!(matches!(args.command, Command::Check(_)));
    }

    #[test]
    fn test_dev_and_clean_args() {
        let args = Cli::try_parse_from(["fob", "dev", "--debounce", "250"]).unwrap();
        let Command::Dev(dev) = args.command else {
            panic!("expected dev command");
        };
        assert_eq!(dev.debounce, Some(250));

        let args = Cli::try_parse_from(["fob", "clean", "--outputs"]).unwrap();
        let Command::Clean(clean) = args.command else {
            panic!("expected clean command");
        };
        assert!(clean.outputs);
    }
}
