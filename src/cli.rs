use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Scrape question pages into the title -> answer corpus
    Scrape {
        /// First question ID (defaults to the ID after the last scraped one)
        #[clap(long)]
        start: Option<u64>,

        /// Last question ID, inclusive
        #[clap(long)]
        end: Option<u64>,
    },

    /// Semantic search over the indexed question titles
    Search {
        /// What to search for
        query: String,

        /// Number of results to return
        #[clap(short = 'n', long = "num_results", default_value_t = 5)]
        num_results: usize,
    },

    /// Embed the question dataset into the vector collection
    Ingest {},

    /// Start the HTTP search service
    Serve {
        /// Address to listen on (overrides `server.bind`)
        #[clap(short, long)]
        bind: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_args() {
        let args = Args::try_parse_from(["stacksearch", "search", "segfault in c", "-n", "3"]).unwrap();
        match args.command {
            Command::Search { query, num_results } => {
                assert_eq!(query, "segfault in c");
                assert_eq!(num_results, 3);
            }
            other => panic!("unexpected command {other:?}"),
        }

        let args = Args::try_parse_from(["stacksearch", "search", "x", "--num_results", "9"]).unwrap();
        assert!(matches!(args.command, Command::Search { num_results: 9, .. }));

        let args = Args::try_parse_from(["stacksearch", "search", "x"]).unwrap();
        assert!(matches!(args.command, Command::Search { num_results: 5, .. }));
    }

    #[test]
    fn test_scrape_args() {
        let args = Args::try_parse_from(["stacksearch", "scrape", "--start", "10"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Scrape {
                start: Some(10),
                end: None
            }
        ));
    }

    #[test]
    fn test_search_requires_query() {
        assert!(Args::try_parse_from(["stacksearch", "search"]).is_err());
    }
}
