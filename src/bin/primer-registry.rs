use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::info;

use primer_registry::aliases::{self, AliasTable};
use primer_registry::bedfile::BedFile;
use primer_registry::index::{self, UrlTemplate};
use primer_registry::modify::Mutation;
use primer_registry::repo::{self, CreateOptions};
use primer_registry::schema::{Collection, LinkField, PrimerClass, SchemeIdentity, SchemeStatus};
use primer_registry::search::{self, SearchQuery};

/// primer-registry CLI
#[derive(Parser)]
#[command(name = "primer-registry")]
#[command(version)]
#[command(about = "Curate primer scheme metadata, payloads and the registry index", long_about = None)]
struct Cli {
    /// More logging (debug)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Less logging (warnings and errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new scheme version from a designer output directory
    Create(CreateArgs),

    /// Edit one field of an existing info.json and regenerate its README
    Modify {
        #[command(subcommand)]
        command: ModifyCommand,
    },

    /// Rehash payloads, recompute articbedversion, migrate info.json to the current schema and rewrite the README
    Regenerate {
        /// Path to info.json
        schemeinfo: PathBuf,
        /// Accept and record changed payload digests
        #[arg(long)]
        rehash: bool,
    },

    /// Delete a scheme version and any directories left empty above it
    Remove {
        /// Path to info.json
        schemeinfo: PathBuf,
    },

    /// Build index.json over parentdir/primerschemes
    BuildIndex {
        /// Git server for download URLs
        #[arg(long, default_value = "https://raw.githubusercontent.com")]
        gitserver: String,
        /// Git account for download URLs
        #[arg(long, default_value = "quick-lab")]
        gitaccount: String,
        /// Git repository for download URLs
        #[arg(long, default_value = "primerschemes")]
        gitrepo: String,
        /// Commit SHA; URLs point at `main` when absent
        #[arg(long)]
        gitcommit: Option<String>,
        /// Directory containing primerschemes/; index.json is written here
        #[arg(long, default_value = ".")]
        parentdir: PathBuf,
        /// Overwrite an existing index.json
        #[arg(long)]
        force: bool,
    },

    /// Check schemes against every repository rule
    Validate {
        #[command(subcommand)]
        command: ValidateCommand,
    },

    /// Manage an aliases.json file
    Aliases {
        #[command(subcommand)]
        command: AliasCommand,
    },

    /// Search an index.json
    Search {
        /// Path to index.json
        index: PathBuf,
        #[arg(long)]
        status: Option<SchemeStatus>,
        /// Scheme name or alias
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        ampliconsize: Option<u32>,
        #[arg(long)]
        collection: Option<Collection>,
        /// NCBI taxonomy id
        #[arg(long)]
        species: Option<u32>,
        /// aliases.json consulted on top of the built-in aliases
        #[arg(long)]
        aliases: Option<PathBuf>,
    },

    /// Regenerate every scheme under a directory, recording new payload digests
    Migrate {
        directory: PathBuf,
    },

    /// Primer BED utilities
    Bed {
        #[command(subcommand)]
        command: BedCommand,
    },
}

#[derive(Args)]
struct CreateArgs {
    /// Directory holding the designer output (primer.bed, reference.fasta, config.json, plots)
    schemepath: PathBuf,
    #[arg(long)]
    schemename: String,
    #[arg(long)]
    ampliconsize: u32,
    #[arg(long)]
    schemeversion: String,
    /// NCBI taxonomy ids (repeatable)
    #[arg(long, required = true)]
    species: Vec<u32>,
    /// Authors in display order (repeatable)
    #[arg(long, required = true)]
    authors: Vec<String>,
    #[arg(long, default_value = "draft")]
    schemestatus: SchemeStatus,
    /// Citations, preferably DOIs (repeatable)
    #[arg(long)]
    citations: Vec<String>,
    /// Primer BED, default: the single *primer.bed under schemepath
    #[arg(long)]
    primerbed: Option<PathBuf>,
    /// Reference FASTA, default: the single reference.fasta under schemepath
    #[arg(long)]
    reference: Option<PathBuf>,
    /// Repository root the scheme is written into
    #[arg(long, default_value = "primerschemes")]
    output: PathBuf,
    /// Designer config.json, default: the config.json under schemepath if any
    #[arg(long)]
    configpath: Option<PathBuf>,
    /// Designer version, default: read from config.json
    #[arg(long)]
    algorithmversion: Option<String>,
    #[arg(long)]
    description: Option<String>,
    /// Scheme this one was derived from
    #[arg(long)]
    derivedfrom: Option<String>,
    #[arg(long, default_value = "primerschemes")]
    primerclass: PrimerClass,
    /// Collections (repeatable)
    #[arg(long)]
    collection: Vec<Collection>,
    #[arg(long)]
    contactinfo: Option<String>,
    /// Replace an existing scheme version
    #[arg(long)]
    overwrite: bool,
}

#[derive(Subcommand)]
enum ModifyCommand {
    /// Add an author, appended or at --position
    AddAuthor {
        schemeinfo: PathBuf,
        author: String,
        /// 0-based insert position
        #[arg(long)]
        position: Option<usize>,
    },
    RemoveAuthor { schemeinfo: PathBuf, author: String },
    /// Move authors at the given 0-based indices to the front; the rest follow in order
    ReorderAuthors {
        schemeinfo: PathBuf,
        #[arg(required = true, value_delimiter = ',')]
        order: Vec<usize>,
    },
    AddCitation { schemeinfo: PathBuf, citation: String },
    RemoveCitation { schemeinfo: PathBuf, citation: String },
    AddCollection { schemeinfo: PathBuf, collection: Collection },
    RemoveCollection { schemeinfo: PathBuf, collection: Collection },
    /// Replace the description ('None' clears it)
    ChangeDescription { schemeinfo: PathBuf, description: String },
    /// Replace derivedfrom ('None' clears it)
    ChangeDerivedfrom { schemeinfo: PathBuf, derivedfrom: String },
    /// Replace the license ('None' marks the work unlicensed)
    ChangeLicense { schemeinfo: PathBuf, license: String },
    ChangeStatus { schemeinfo: PathBuf, status: SchemeStatus },
    ChangePrimerclass { schemeinfo: PathBuf, primerclass: PrimerClass },
    /// Replace the contact info ('None' clears it)
    ChangeContactinfo { schemeinfo: PathBuf, contactinfo: String },
    /// Add a URL under protocols, validation, homepage, vendors or misc
    AddLink { schemeinfo: PathBuf, field: LinkField, url: String },
    RemoveLink { schemeinfo: PathBuf, field: LinkField, url: String },
}

impl ModifyCommand {
    fn into_mutation(self) -> (PathBuf, Mutation) {
        use ModifyCommand::*;
        match self {
            AddAuthor { schemeinfo, author, position } => (schemeinfo, Mutation::AddAuthor { author, position }),
            RemoveAuthor { schemeinfo, author } => (schemeinfo, Mutation::RemoveAuthor(author)),
            ReorderAuthors { schemeinfo, order } => (schemeinfo, Mutation::ReorderAuthors(order)),
            AddCitation { schemeinfo, citation } => (schemeinfo, Mutation::AddCitation(citation)),
            RemoveCitation { schemeinfo, citation } => (schemeinfo, Mutation::RemoveCitation(citation)),
            AddCollection { schemeinfo, collection } => (schemeinfo, Mutation::AddCollection(collection)),
            RemoveCollection { schemeinfo, collection } => (schemeinfo, Mutation::RemoveCollection(collection)),
            ChangeDescription { schemeinfo, description } => (schemeinfo, Mutation::ChangeDescription(description)),
            ChangeDerivedfrom { schemeinfo, derivedfrom } => (schemeinfo, Mutation::ChangeDerivedFrom(derivedfrom)),
            ChangeLicense { schemeinfo, license } => (schemeinfo, Mutation::ChangeLicense(license)),
            ChangeStatus { schemeinfo, status } => (schemeinfo, Mutation::ChangeStatus(status)),
            ChangePrimerclass { schemeinfo, primerclass } => (schemeinfo, Mutation::ChangePrimerClass(primerclass)),
            ChangeContactinfo { schemeinfo, contactinfo } => (schemeinfo, Mutation::ChangeContactInfo(contactinfo)),
            AddLink { schemeinfo, field, url } => (schemeinfo, Mutation::AddLink { field, url }),
            RemoveLink { schemeinfo, field, url } => (schemeinfo, Mutation::RemoveLink { field, url }),
        }
    }
}

#[derive(Subcommand)]
enum ValidateCommand {
    /// Validate one scheme
    Scheme { schemeinfo: PathBuf },
    /// Validate every scheme under a directory
    AllSchemes { directory: PathBuf },
}

#[derive(Subcommand)]
enum AliasCommand {
    /// Add alias -> schemename; an existing alias is left unchanged
    Add { aliases_file: PathBuf, alias: String, schemename: String },
    /// Remove an alias; does nothing if it is absent
    Remove { aliases_file: PathBuf, alias: String },
    /// Print the built-in aliases, overlaid with an aliases.json if given
    List {
        #[arg(long)]
        aliases_file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum BedCommand {
    /// Print the canonical form of a primer BED file
    Normalize {
        bedfile: PathBuf,
        /// Rename v1 primers to the v2 grammar
        #[arg(long)]
        upgrade_names: bool,
    },
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Create(args) => cmd_create(args)?,
        Commands::Modify { command } => {
            let (schemeinfo, mutation) = command.into_mutation();
            repo::modify(&schemeinfo, &mutation).with_context(|| format!("modifying {}", schemeinfo.display()))?;
        }
        Commands::Regenerate { schemeinfo, rehash } => {
            repo::regenerate(&schemeinfo, rehash).with_context(|| format!("regenerating {}", schemeinfo.display()))?;
        }
        Commands::Remove { schemeinfo } => {
            repo::remove(&schemeinfo).with_context(|| format!("removing {}", schemeinfo.display()))?;
        }
        Commands::BuildIndex { gitserver, gitaccount, gitrepo, gitcommit, parentdir, force } => {
            let urls = UrlTemplate { server: gitserver, account: gitaccount, repository: gitrepo, commit: gitcommit };
            index::write_index(&parentdir, &urls, force)?;
        }
        Commands::Validate { command } => match command {
            ValidateCommand::Scheme { schemeinfo } => {
                let info = repo::validate_scheme(&schemeinfo)?;
                info!("{} is valid", info.identity());
            }
            ValidateCommand::AllSchemes { directory } => {
                repo::validate_all(&directory)?;
            }
        },
        Commands::Aliases { command } => match command {
            AliasCommand::Add { aliases_file, alias, schemename } => {
                aliases::add(&aliases_file, &alias, &schemename)?;
            }
            AliasCommand::Remove { aliases_file, alias } => {
                aliases::remove(&aliases_file, &alias)?;
            }
            AliasCommand::List { aliases_file } => {
                let table = match aliases_file {
                    Some(path) => AliasTable::with_file(&path),
                    None => AliasTable::builtin(),
                };
                set_table_format();
                println!("{}", table.to_dataframe()?);
            }
        },
        Commands::Search { index, status, name, ampliconsize, collection, species, aliases } => {
            let table = match aliases {
                Some(path) => AliasTable::with_file(&path),
                None => AliasTable::builtin(),
            };
            let query = SearchQuery { status, name, ampliconsize, collection, species };
            cmd_search(&index, &query, &table)?;
        }
        Commands::Migrate { directory } => {
            repo::migrate_all(&directory)?;
        }
        Commands::Bed { command: BedCommand::Normalize { bedfile, upgrade_names } } => {
            let mut bed = BedFile::from_path(&bedfile).with_context(|| format!("reading {}", bedfile.display()))?;
            if upgrade_names {
                bed.upgrade_primer_names()?;
            }
            print!("{}", bed.to_canonical_string());
        }
    }
    Ok(())
}

fn cmd_create(args: CreateArgs) -> anyhow::Result<()> {
    let identity = SchemeIdentity::new(args.schemename, args.ampliconsize, args.schemeversion)?;
    let opts = CreateOptions {
        identity,
        species: args.species,
        authors: args.authors,
        status: args.schemestatus,
        citations: args.citations,
        primerbed: args.primerbed,
        reference: args.reference,
        configpath: args.configpath,
        algorithmversion: args.algorithmversion,
        description: args.description,
        derivedfrom: args.derivedfrom,
        primerclass: args.primerclass,
        collections: args.collection,
        contactinfo: args.contactinfo,
        overwrite: args.overwrite,
    };
    repo::create(&args.schemepath, &args.output, &opts)
        .with_context(|| format!("creating {} from {}", opts.identity, args.schemepath.display()))?;
    Ok(())
}

fn cmd_search(index_path: &std::path::Path, query: &SearchQuery, aliases: &AliasTable) -> anyhow::Result<()> {
    let index = index::Index::from_path(index_path)?;
    let hits = search::search(&index, query, aliases);
    if hits.is_empty() {
        info!("no schemes match");
        return Ok(());
    }
    let df = search::to_dataframe(&hits)?;
    set_table_format();
    println!("{}", df);
    Ok(())
}

/// Print polars tables in full, without truncating rows, columns or cells.
fn set_table_format() {
    std::env::set_var("POLARS_FMT_TABLE_FORMATTING", "UTF8_FULL");
    std::env::set_var("POLARS_FMT_MAX_COLS", "100000");
    std::env::set_var("POLARS_FMT_MAX_ROWS", "1000000");
    std::env::set_var("POLARS_FMT_STR_LEN", "100000");
    std::env::set_var("POLARS_TABLE_WIDTH", "65535");
}
