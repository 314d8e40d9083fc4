use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};
use vecscan::{EngineConfig, VecError};

/// Query vectors longer than this route to the GIST dataset by default.
const GIST_DIMENSION_THRESHOLD: usize = 128;
const GIST_STORE: &str = "../datasets/gist/gist_base.vstore";
const SIFT_STORE: &str = "../datasets/sift/sift_base.vstore";

#[derive(Parser, Debug)]
#[command(name = "vecscan", version, about = "Exact nearest-neighbor search over fvecs datasets")]
pub struct Cli {
    /// JSON file overriding batch size, chunk size and k
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert an fvecs file into a search store
    Convert {
        /// Path to the input .fvecs file
        #[arg(long)]
        data: PathBuf,
        /// Records decoded per batch
        #[arg(long)]
        batch_size: Option<usize>,
        /// Store location (defaults to the input path with a .vstore extension)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the identifiers of the nearest stored vectors
    Search {
        /// Query vector, e.g. "[1.0,2.5,3]"
        #[arg(long, allow_hyphen_values = true)]
        query: String,
        /// Store to search (defaults by query dimensionality)
        #[arg(long)]
        store: Option<PathBuf>,
        /// Number of neighbors
        #[arg(short, long)]
        k: Option<usize>,
        /// Rows streamed per chunk
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(long, default_value = "0.0.0.0:7878")]
        bind: String,
    },
}

/// Parse a query vector from text
/// Accepts comma-separated floats with optional surrounding brackets: "[1, 2.5,3]"
pub fn parse_query_vector(text: &str) -> Result<Vec<f32>, VecError> {
    let inner = text.trim().trim_start_matches('[').trim_end_matches(']');
    if inner.trim().is_empty() {
        return Err(VecError::QueryParse {
            input: text.to_string(),
            reason: "query vector is empty".to_string(),
        });
    }

    inner
        .split(',')
        .map(|part| {
            part.trim().parse::<f32>().map_err(|e| VecError::QueryParse {
                input: text.to_string(),
                reason: format!("'{}': {}", part.trim(), e),
            })
        })
        .collect()
}

/// Pick the dataset store for a query when none is given
pub fn default_store_path(dimension: usize) -> &'static Path {
    if dimension > GIST_DIMENSION_THRESHOLD {
        Path::new(GIST_STORE)
    } else {
        Path::new(SIFT_STORE)
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

/// Runs convert or search. `Serve` is handled by `main`.
pub fn execute(config_path: Option<&Path>, command: Command) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    match command {
        Command::Convert { data, batch_size, output } => {
            let batch_size = batch_size.unwrap_or(config.read_batch_size);
            let output = output.unwrap_or_else(|| vecscan::store::store_path_for(&data));
            let summary = vecscan::convert_to(&data, &output, batch_size)?;
            println!("Dataset saved to {}", summary.output.display());
        }

        Command::Search { query, store, k, chunk_size } => {
            let query = parse_query_vector(&query)?;
            let store = store.unwrap_or_else(|| default_store_path(query.len()).to_path_buf());
            let k = k.unwrap_or(config.k);
            let chunk_size = chunk_size.unwrap_or(config.chunk_size);

            info!("searching {} for {} neighbors", store.display(), k);
            let ids = vecscan::search_with(&query, &store, k, chunk_size)?;
            let line: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
            println!("{}", line.join(","));
        }

        Command::Serve { .. } => {
            anyhow::bail!("serve runs the HTTP server and is dispatched by main")
        }
    }

    Ok(())
}

#[cfg(test)]
mod cli_test {
    use super::*;

    #[test]
    fn test_parse_query_with_brackets() {
        assert_eq!(parse_query_vector("[1,2.5,-3]").unwrap(), vec![1.0, 2.5, -3.0]);
    }

    #[test]
    fn test_parse_query_without_brackets() {
        assert_eq!(parse_query_vector(" 0.5, 1e3 ,7 ").unwrap(), vec![0.5, 1000.0, 7.0]);
    }

    #[test]
    fn test_parse_query_rejects_garbage() {
        match parse_query_vector("[1,abc,3]") {
            Err(VecError::QueryParse { reason, .. }) => assert!(reason.contains("abc")),
            other => panic!("Expected query parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_query_rejects_empty() {
        assert!(parse_query_vector("[]").is_err());
        assert!(parse_query_vector("").is_err());
        assert!(parse_query_vector("[1,,2]").is_err());
    }

    #[test]
    fn test_default_store_routing() {
        assert_eq!(default_store_path(960), Path::new(GIST_STORE));
        assert_eq!(default_store_path(129), Path::new(GIST_STORE));
        assert_eq!(default_store_path(128), Path::new(SIFT_STORE));
        assert_eq!(default_store_path(2), Path::new(SIFT_STORE));
    }

    #[test]
    fn test_cli_parses_search() {
        let args = ["vecscan", "search", "--query", "[1,2]", "-k", "3"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Search { query, k, store, chunk_size } => {
                assert_eq!(query, "[1,2]");
                assert_eq!(k, Some(3));
                assert!(store.is_none());
                assert!(chunk_size.is_none());
            }
            other => panic!("Expected search, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_parses_convert() {
        let args = ["vecscan", "convert", "--data", "base.fvecs", "--batch-size", "64"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Convert { data, batch_size, output } => {
                assert_eq!(data, PathBuf::from("base.fvecs"));
                assert_eq!(batch_size, Some(64));
                assert!(output.is_none());
            }
            other => panic!("Expected convert, got {:?}", other),
        }
    }

    #[test]
    fn test_execute_convert_then_search() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("points.fvecs");
        let rows: Vec<Vec<f32>> = vec![vec![0.0, 0.0], vec![3.0, 4.0]];
        vecscan::fvecs::write_fvecs(&input, rows.iter().map(|r| r.as_slice())).unwrap();

        let convert = Command::Convert { data: input.clone(), batch_size: None, output: None };
        execute(None, convert).unwrap();
        let store = dir.path().join("points.vstore");
        assert!(store.exists());

        let search = Command::Search {
            query: "[3,4]".to_string(),
            store: Some(store),
            k: Some(1),
            chunk_size: None,
        };
        execute(None, search).unwrap();
    }

    #[test]
    fn test_load_config_for_serve() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"k": 4}"#).unwrap();

        assert_eq!(load_config(Some(path.as_path())).unwrap().k, 4);
        assert_eq!(load_config(None).unwrap(), EngineConfig::default());

        let err = load_config(Some(dir.path().join("missing.json").as_path())).unwrap_err();
        assert!(format!("{:#}", err).contains("loading config"));
    }

    #[test]
    fn test_execute_search_missing_store() {
        let result = execute(
            None,
            Command::Search {
                query: "[1,2]".to_string(),
                store: Some(PathBuf::from("missing_store.vstore")),
                k: None,
                chunk_size: None,
            },
        );
        let err = result.unwrap_err();
        assert!(matches!(err.downcast_ref::<VecError>(), Some(VecError::FileNotFound { .. })));
    }
}
