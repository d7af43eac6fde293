//! Command handlers behind the CLI.

use std::collections::HashSet;
use std::fs;
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;
use tracing::{debug, info};

use super::{ApplyArgs, Cli, Command, OutputFormat, ResultIdsArgs, RunArgs, ShowArgs};
use crate::cache::{CachedMutant, SqliteCache};
use crate::config::{Config, CoveredLines, RunConfig};
use crate::core::{guess_paths_to_mutate, hash_of_tests, Error, FileSet, Progress, Result};
use crate::mutation::{
    atomic_write, coverage, list_mutations, mutate, time_test_suite, Evaluator,
    FileMutants, MutationCategory, MutationContext, MutationStatus, Pipeline, ShellRunner, Target,
    TestRunner,
};
use crate::output::{unified_diff, Format};

/// Run the parsed command line and return the process exit code.
pub fn execute(cli: Cli) -> Result<i32> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load_default(&cli.path)?,
    };
    std::env::set_current_dir(&cli.path).map_err(|_| Error::FileNotFound {
        path: cli.path.clone(),
    })?;

    let format = match cli.format {
        OutputFormat::Json => Format::Json,
        OutputFormat::Text => Format::Text,
    };

    match cli.command {
        Command::Run(args) => run(config, args, format),
        Command::Results => {
            let cache = open_cache(&config)?;
            format.write_results(&cache.mutants()?, &mut stdout())?;
            Ok(0)
        }
        Command::ResultIds(args) => result_ids(&config, args, format),
        Command::Apply(args) => apply(&config, args),
        Command::Show(args) => show(&config, args, format),
    }
}

/// What `run ARGUMENT` selects.
#[derive(Debug, PartialEq)]
enum RunTarget {
    Id(i64),
    File(PathBuf),
}

impl RunTarget {
    fn parse(argument: &str, root: &Path) -> Result<Self> {
        if let Ok(id) = argument.parse() {
            return Ok(Self::Id(id));
        }
        let path = Path::new(argument);
        if path.is_file() {
            return Ok(Self::File(coverage::normalize(path, root)));
        }
        Err(Error::InvalidArgument(
            "The run command takes either an integer that is the mutation id or a path to a file to mutate"
                .to_string(),
        ))
    }
}

fn run(mut config: Config, args: RunArgs, format: Format) -> Result<i32> {
    apply_overrides(&args, &mut config);
    let say = |line: &str| match format {
        Format::Json => eprintln!("{line}"),
        Format::Text => println!("{line}"),
    };

    let mutation_types_to_apply =
        mutation_types_to_apply(&config.enable_mutation_types, &config.disable_mutation_types)?;
    let root = std::env::current_dir()?;
    let target = args
        .argument
        .as_deref()
        .map(|argument| RunTarget::parse(argument, &root))
        .transpose()?;

    let paths_to_mutate: Vec<PathBuf> = if config.paths_to_mutate.is_empty() {
        vec![guess_paths_to_mutate(&root)?]
    } else {
        config
            .paths_to_mutate
            .iter()
            .flat_map(|paths| split_paths(paths))
            .map(PathBuf::from)
            .collect()
    };
    let tests_dirs = tests_dirs(&config.tests_dir, &paths_to_mutate);
    let hash = hash_of_tests(&tests_dirs)?;
    debug!(?paths_to_mutate, ?tests_dirs, %hash, "resolved run inputs");

    let covered_lines_by_filename = if let Some(path) = &args.use_coverage {
        let covered = coverage::read_coverage_py(path, &root)?;
        check_coverage_paths(path, &covered)?;
        Some(Arc::new(covered))
    } else if let Some(path) = &args.use_patch_file {
        Some(Arc::new(coverage::read_patch(path, &root)?))
    } else {
        None
    };

    let mut run_config = RunConfig {
        swallow_output: config.swallow_output,
        test_time_multiplier: config.test_time_multiplier,
        test_time_base: config.test_time_base,
        timeout: config.timeout.map(seconds).transpose()?,
        rerun_all: config.rerun_all,
        pre_mutation: config.pre_mutation.clone(),
        post_mutation: config.post_mutation.clone(),
        paths_to_mutate: paths_to_mutate.clone(),
        mutation_types_to_apply,
        covered_lines_by_filename,
        dict_synonyms: config.dict_synonyms.clone(),
        hash_of_tests: hash,
        ci: args.ci,
        no_progress: args.no_progress,
        simple_output: args.simple_output,
        max_workers: config.max_workers,
        ..RunConfig::default()
    }
    .with_test_command(&config.runner);

    let cache = Arc::new(open_cache(&config)?);
    let runner: Arc<dyn TestRunner> = Arc::new(ShellRunner::new());

    run_config.baseline_time_elapsed = match cache.baseline(&run_config.hash_of_tests)? {
        Some(elapsed) => {
            say("1. Using cached time for baseline tests, to run baseline again delete the cache file");
            elapsed
        }
        None => {
            say("1. Running tests without mutations");
            let elapsed = time_test_suite(
                runner.as_ref(),
                &run_config.test_command,
                run_config.swallow_output,
                &mut |line| say(line),
            )?;
            cache.set_baseline(&run_config.hash_of_tests, elapsed)?;
            say("Done");
            elapsed
        }
    };
    info!(baseline = ?run_config.baseline_time_elapsed, "baseline measured");

    let files = match target {
        Some(RunTarget::Id(id)) => {
            let mutant = find_mutant(&cache, id)?;
            vec![FileMutants::new(mutant.filename, vec![mutant.address])]
        }
        Some(RunTarget::File(file)) => {
            let files = generate_mutants(&[file], &run_config)?;
            register(&cache, &files)?;
            files
        }
        None => {
            let file_set = FileSet::from_paths(&paths_to_mutate, &tests_dirs, &config.paths_to_exclude)?;
            let filenames: Vec<PathBuf> = file_set
                .iter()
                .map(|file| coverage::normalize(file, &root))
                .collect();
            let files = generate_mutants(&filenames, &run_config)?;
            register(&cache, &files)?;
            files
        }
    };
    run_config.total = files.iter().map(|file| file.addresses.len()).sum();

    say("");
    say("2. Checking mutants");
    let progress = Progress::new(
        run_config.total,
        !run_config.no_progress && matches!(format, Format::Text),
        run_config.simple_output,
    );
    let ci = run_config.ci;
    let evaluator = Evaluator::new(cache, runner);
    let report = Pipeline::new(evaluator, run_config, progress).run(files);

    format.write_summary(&report.summary, &mut stdout())?;
    if let Some(err) = &report.fatal {
        eprintln!("Error: {err:#}");
    }
    Ok(report.exit_code(ci))
}

/// Command-line flags win over file configuration.
fn apply_overrides(args: &RunArgs, config: &mut Config) {
    if let Some(paths) = &args.paths_to_mutate {
        config.paths_to_mutate = split_paths(paths);
    }
    if let Some(types) = &args.disable_mutation_types {
        config.disable_mutation_types = split_commas(types);
    }
    if let Some(types) = &args.enable_mutation_types {
        config.enable_mutation_types = split_commas(types);
    }
    if let Some(patterns) = &args.paths_to_exclude {
        config.paths_to_exclude = split_commas(patterns);
    }
    if let Some(runner) = &args.runner {
        config.runner.clone_from(runner);
    }
    if let Some(dirs) = &args.tests_dir {
        config.tests_dir = split_paths(dirs);
    }
    if let Some(multiplier) = args.test_time_multiplier {
        config.test_time_multiplier = multiplier;
    }
    if let Some(base) = args.test_time_base {
        config.test_time_base = base;
    }
    if args.swallow_output {
        config.swallow_output = false;
    }
    if let Some(synonyms) = &args.dict_synonyms {
        config.dict_synonyms = split_commas(synonyms);
    }
    if args.pre_mutation.is_some() {
        config.pre_mutation.clone_from(&args.pre_mutation);
    }
    if args.post_mutation.is_some() {
        config.post_mutation.clone_from(&args.post_mutation);
    }
    config.rerun_all |= args.rerun_all;
    if let Some(workers) = args.max_workers {
        config.max_workers = workers;
    }
    if args.timeout.is_some() {
        config.timeout = args.timeout;
    }
}

fn split_commas(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Path lists accept both `,` and `:` as separators.
fn split_paths(value: &str) -> Vec<String> {
    value
        .split([',', ':'])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn seconds(value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| Error::InvalidArgument(format!("invalid timeout: {value}")))
}

fn mutation_types_to_apply(
    enable: &[String],
    disable: &[String],
) -> Result<HashSet<MutationCategory>> {
    if !enable.is_empty() && !disable.is_empty() {
        return Err(Error::InvalidArgument(
            "You can't combine --disable-mutation-types and --enable-mutation-types".to_string(),
        ));
    }
    let requested = if enable.is_empty() { disable } else { enable };

    let mut parsed = HashSet::new();
    let mut invalid = Vec::new();
    for name in requested {
        match MutationCategory::from_str(name) {
            Ok(category) => {
                parsed.insert(category);
            }
            Err(_) => invalid.push(name.as_str()),
        }
    }
    if !invalid.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "The following are not valid mutation types: {}. Valid mutation types are: {}",
            invalid.join(", "),
            MutationCategory::ALL.map(|c| c.as_str()).join(", ")
        )));
    }

    if enable.is_empty() {
        Ok(MutationCategory::ALL
            .into_iter()
            .filter(|category| !parsed.contains(category))
            .collect())
    } else {
        Ok(parsed)
    }
}

/// Existing test directories, both as given and nested under each path to
/// mutate.
fn tests_dirs(configured: &[String], paths_to_mutate: &[PathBuf]) -> Vec<PathBuf> {
    let configured: Vec<PathBuf> = configured
        .iter()
        .flat_map(|dirs| split_paths(dirs))
        .map(PathBuf::from)
        .collect();
    let mut dirs: Vec<PathBuf> = configured.iter().filter(|dir| dir.is_dir()).cloned().collect();
    for path in paths_to_mutate {
        for dir in &configured {
            let nested = path.join(dir);
            if nested.is_dir() {
                dirs.push(nested);
            }
        }
    }
    dirs.sort();
    dirs.dedup();
    dirs
}

/// A report naming none of the files on disk was almost certainly produced
/// from another checkout.
fn check_coverage_paths(report: &Path, covered: &CoveredLines) -> Result<()> {
    let missing: Vec<String> = covered
        .keys()
        .filter(|path| !path.exists())
        .map(|path| path.display().to_string())
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(Error::config(format!(
        "Filepaths in {} are not recognized, is the report up to date? Missing: {}",
        report.display(),
        missing.join(", ")
    )))
}

fn generate_mutants(files: &[PathBuf], config: &RunConfig) -> Result<Vec<FileMutants>> {
    files
        .par_iter()
        .map(|file| -> Result<FileMutants> {
            let source = read_source(file)?;
            let mut ctx =
                MutationContext::new(source, Target::All, config.clone()).with_filename(file);
            let addresses = list_mutations(&mut ctx)?;
            debug!(file = %file.display(), mutants = addresses.len(), "listed mutants");
            Ok(FileMutants::new(file.clone(), addresses))
        })
        .collect()
}

fn register(cache: &SqliteCache, files: &[FileMutants]) -> Result<()> {
    for file in files {
        cache.register_mutants(&file.filename, &file.addresses)?;
    }
    Ok(())
}

fn open_cache(config: &Config) -> Result<SqliteCache> {
    SqliteCache::open(&config.cache_file)
}

fn find_mutant(cache: &SqliteCache, id: i64) -> Result<CachedMutant> {
    cache
        .mutant(id)?
        .ok_or_else(|| Error::InvalidArgument(format!("No mutant with id {id}")))
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => Error::Io(e),
    })
}

/// Source of `mutant`'s file with that one mutation applied.
fn mutated_source(config: &Config, mutant: &CachedMutant, source: &str) -> Result<String> {
    let run_config = RunConfig {
        dict_synonyms: config.dict_synonyms.clone(),
        ..RunConfig::default()
    };
    let mut ctx = MutationContext::new(source, Target::One(mutant.address.clone()), run_config)
        .with_filename(&mutant.filename);
    let (mutated, count) = mutate(&mut ctx)?;
    if count != 1 {
        return Err(Error::internal(format!(
            "mutant {} no longer applies to {}",
            mutant.id,
            mutant.filename.display()
        )));
    }
    Ok(mutated)
}

fn result_ids(config: &Config, args: ResultIdsArgs, format: Format) -> Result<i32> {
    let cache = open_cache(config)?;
    format.write_ids(&cache.ids_with_status(args.status)?, &mut stdout())?;
    Ok(0)
}

fn apply(config: &Config, args: ApplyArgs) -> Result<i32> {
    let cache = open_cache(config)?;
    let mutant = find_mutant(&cache, args.id)?;
    let source = read_source(&mutant.filename)?;
    let mutated = mutated_source(config, &mutant, &source)?;
    if args.backup {
        let mut backup = mutant.filename.clone().into_os_string();
        backup.push(".bak");
        fs::write(PathBuf::from(backup), &source)?;
    }
    atomic_write(&mutant.filename, mutated.as_bytes())?;
    info!(id = mutant.id, file = %mutant.filename.display(), "applied mutant");
    Ok(0)
}

fn show(config: &Config, args: ShowArgs, format: Format) -> Result<i32> {
    let cache = open_cache(config)?;
    let Some(selector) = args.id_or_file else {
        format.write_results(&cache.mutants()?, &mut stdout())?;
        return Ok(0);
    };

    let selected: Vec<CachedMutant> = if let Ok(id) = selector.parse::<i64>() {
        vec![find_mutant(&cache, id)?]
    } else {
        let file = (selector != "all").then(|| PathBuf::from(&selector));
        cache
            .mutants()?
            .into_iter()
            .filter(|mutant| mutant.status != MutationStatus::Killed)
            .filter(|mutant| file.as_ref().is_none_or(|file| mutant.filename == *file))
            .collect()
    };

    let mut shown = Vec::with_capacity(selected.len());
    for mutant in selected {
        let source = read_source(&mutant.filename)?;
        let mutated = mutated_source(config, &mutant, &source)?;
        let diff = unified_diff(&mutant.filename, &source, &mutated);
        shown.push((mutant, diff));
    }
    format.write_mutants(&shown, &mut stdout())?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_split_paths() {
        assert_eq!(split_paths("src, lib:pkg"), vec!["src", "lib", "pkg"]);
        assert!(split_paths("").is_empty());
        assert_eq!(split_commas("a:b,c"), vec!["a:b", "c"]);
    }

    #[test]
    fn test_mutation_types_disable() {
        let types = mutation_types_to_apply(&[], &["string".to_string()]).unwrap();
        assert_eq!(types.len(), MutationCategory::ALL.len() - 1);
        assert!(!types.contains(&MutationCategory::String));
    }

    #[test]
    fn test_mutation_types_enable() {
        let types =
            mutation_types_to_apply(&["operator".to_string(), "number".to_string()], &[]).unwrap();
        assert_eq!(
            types,
            HashSet::from([MutationCategory::Operator, MutationCategory::Number])
        );
    }

    #[test]
    fn test_mutation_types_rejects_unknown() {
        let err = mutation_types_to_apply(&["operator".to_string(), "bogus".to_string()], &[])
            .unwrap_err()
            .to_string();
        assert!(err.contains("not valid mutation types: bogus"));
        assert!(err.contains("annassign"));
    }

    #[test]
    fn test_mutation_types_rejects_combination() {
        let result = mutation_types_to_apply(&["operator".to_string()], &["string".to_string()]);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_run_target_parse() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.py");
        fs::write(&file, "x = 1\n").unwrap();

        assert_eq!(RunTarget::parse("12", dir.path()).unwrap(), RunTarget::Id(12));
        assert_eq!(
            RunTarget::parse(file.to_str().unwrap(), dir.path()).unwrap(),
            RunTarget::File(PathBuf::from("a.py"))
        );
        assert!(RunTarget::parse("missing.py", dir.path()).is_err());
    }

    #[test]
    fn test_tests_dirs_includes_nested() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("checks")).unwrap();
        fs::create_dir_all(dir.path().join("pkg/checks")).unwrap();

        let top = format!("{}/checks/", dir.path().display());
        let found = tests_dirs(&[top, "missing/".to_string()], &[dir.path().join("pkg")]);
        assert_eq!(found, vec![dir.path().join("checks")]);

        let found = tests_dirs(&["checks".to_string()], &[dir.path().join("pkg")]);
        assert_eq!(found, vec![dir.path().join("pkg").join("checks")]);
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = Config::default();
        let args = RunArgs {
            paths_to_mutate: Some("src:lib".to_string()),
            runner: Some("pytest -q".to_string()),
            swallow_output: true,
            max_workers: Some(8),
            test_time_base: Some(60.0),
            ..RunArgs::default()
        };
        apply_overrides(&args, &mut config);
        assert_eq!(config.paths_to_mutate, vec!["src", "lib"]);
        assert_eq!(config.runner, "pytest -q");
        assert!(!config.swallow_output);
        assert_eq!(config.max_workers, 8);
        assert!((config.test_time_base - 60.0).abs() < f64::EPSILON);
        assert!((config.test_time_multiplier - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_check_coverage_paths() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("a.py");
        fs::write(&present, "").unwrap();
        let covered = CoveredLines::from([(present, HashSet::from([1]))]);
        assert!(check_coverage_paths(Path::new("c.json"), &covered).is_ok());

        let covered = CoveredLines::from([(dir.path().join("gone.py"), HashSet::from([1]))]);
        assert!(check_coverage_paths(Path::new("c.json"), &covered).is_err());
    }
}
