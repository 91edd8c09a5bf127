use briefkit::agent::ExecutionId;
use briefkit::runner::run_execution;
use briefkit::runtime::RuntimeRegistry;
use briefkit::store::StorePaths;

struct RunnerArgs {
    execution_id: ExecutionId,
    retry: bool,
    store_root: Option<String>,
}

fn parse_args(args: &[String]) -> Result<RunnerArgs, String> {
    let mut retry = false;
    let mut store_root = None;
    let mut execution_id = None;

    for arg in args {
        if arg == "--retry" {
            retry = true;
        } else if let Some(value) = arg.strip_prefix("--store-root=") {
            store_root = Some(value.to_string());
        } else if arg.starts_with("--") {
            return Err(format!("unknown flag `{arg}`"));
        } else if execution_id.is_none() {
            let id = ExecutionId::parse(arg)
                .map_err(|err| format!("invalid execution id `{arg}`: {err}"))?;
            execution_id = Some(id);
        } else {
            return Err(format!("unexpected argument `{arg}`"));
        }
    }

    let Some(execution_id) = execution_id else {
        return Err("usage: briefkit-runner [--retry] [--store-root=PATH] <execution-id>".to_string());
    };

    Ok(RunnerArgs {
        execution_id,
        retry,
        store_root,
    })
}

fn run() -> Result<(), String> {
    let raw_args: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&raw_args)?;

    let paths = match &args.store_root {
        Some(root) => StorePaths::new(root),
        None => StorePaths::resolve_default()
            .map_err(|err| format!("failed to resolve store root: {err}"))?,
    };
    let store = paths
        .open_execution_store()
        .map_err(|err| format!("failed to open execution store: {err}"))?;
    let registry = RuntimeRegistry::with_known_kinds();

    // An execution failure is recorded in the store as a failed terminal
    // status; the runner still exits 0. A non-zero exit means the runner
    // itself broke.
    run_execution(&store, &registry, &args.execution_id, args.retry)
        .map_err(|err| format!("runner failed: {err}"))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
