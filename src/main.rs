use clap::Parser;
use log::{info, warn};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::num::NonZeroUsize;
use synmap::dotplot::{dotplot_geometry, DotplotShape};
use synmap::paf;
use synmap::record::SyntenyRecord;
use synmap::store::{Side, SyntenyStore};
use synmap::synteny::{gap_compressed_identity, project_window};
use synmap::view::{Region, View};

/// Common options shared between all commands
#[derive(Parser, Debug)]
struct CommonOpts {
    /// Path to the PAF file. The parsed records are cached in an associated
    /// index file next to it.
    #[clap(short = 'p', long, value_parser)]
    paf_file: String,

    /// Force the regeneration of the index, even if it already exists.
    #[clap(short = 'I', long, action)]
    force_reindex: bool,

    /// Number of threads for parallel processing.
    #[clap(short = 't', long, value_parser, default_value_t = NonZeroUsize::new(4).unwrap())]
    num_threads: NonZeroUsize,

    /// Verbosity level (0 = error, 1 = info, 2 = debug)
    #[clap(short, long, default_value = "0")]
    verbose: u8,

    /// Name reported for the query assembly
    #[clap(long, default_value = "query")]
    query_assembly: String,

    /// Name reported for the target assembly
    #[clap(long, default_value = "target")]
    target_assembly: String,
}

/// Command-line tool for comparative-alignment geometry over PAF files.
#[derive(Parser, Debug)]
#[command(author, version, about, disable_help_subcommand = true)]
enum Args {
    /// Project a target range through all overlapping alignments
    Query {
        #[clap(flatten)]
        common: CommonOpts,

        /// Target range in the format `seq_name:start-end`
        #[clap(short = 'r', long, value_parser)]
        target_range: String,
    },
    /// Compute dotplot geometry for the whole alignment set
    Dotplot {
        #[clap(flatten)]
        common: CommonOpts,

        /// Plot width in pixels
        #[clap(short = 'W', long, value_parser, default_value_t = 800.0)]
        width: f64,

        /// Plot height in pixels
        #[clap(short = 'H', long, value_parser, default_value_t = 800.0)]
        height: f64,

        /// Draw straight segments instead of following CIGAR drift
        #[clap(long, action)]
        no_cigar: bool,

        /// Run the weighted mean identity pre-pass before mapping
        #[clap(long, action)]
        weighted_means: bool,
    },
    /// Print alignment statistics
    Stats {
        #[clap(flatten)]
        common: CommonOpts,
    },
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    match args {
        Args::Query {
            common,
            target_range,
        } => {
            let store = initialize_store(&common)?;
            let (target_name, (range_start, range_end)) = parse_target_range(&target_range)?;
            output_projections(&store, &target_name, range_start, range_end)?;
        }
        Args::Dotplot {
            common,
            width,
            height,
            no_cigar,
            weighted_means,
        } => {
            let mut store = initialize_store(&common)?;
            if weighted_means {
                store.assign_weighted_means();
            }
            output_dotplot(&store, width, height, !no_cigar)?;
        }
        Args::Stats { common } => {
            let store = initialize_store(&common)?;
            print_stats(&store);
        }
    }

    Ok(())
}

/// Initialize thread pool and load/generate the record index based on
/// common options
fn initialize_store(common: &CommonOpts) -> io::Result<SyntenyStore> {
    // Initialize logger based on verbosity
    env_logger::Builder::new()
        .filter_level(match common.verbose {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    // Configure thread pool
    ThreadPoolBuilder::new()
        .num_threads(common.num_threads.into())
        .build_global()
        .unwrap();

    let records = if common.force_reindex {
        generate_records(&common.paf_file)?
    } else {
        load_or_generate_records(&common.paf_file)?
    };
    info!("Loaded {} alignment records", records.len());

    Ok(SyntenyStore::new(
        records,
        &common.query_assembly,
        &common.target_assembly,
    ))
}

fn index_path(paf_file: &str) -> String {
    format!("{}.synmap", paf_file)
}

fn load_or_generate_records(paf_file: &str) -> io::Result<Vec<SyntenyRecord>> {
    if std::path::Path::new(&index_path(paf_file)).exists() {
        load_records(paf_file)
    } else {
        generate_records(paf_file)
    }
}

fn load_records(paf_file: &str) -> io::Result<Vec<SyntenyRecord>> {
    let index_file = index_path(paf_file);

    let paf_file_metadata = std::fs::metadata(paf_file)?;
    let index_file_metadata = std::fs::metadata(index_file.clone())?;
    if let (Ok(paf_file_ts), Ok(index_file_ts)) =
        (paf_file_metadata.modified(), index_file_metadata.modified())
    {
        if paf_file_ts > index_file_ts {
            warn!("WARNING:\tPAF file has been modified since synmap index creation.");
        }
    } else {
        warn!("WARNING:\tUnable to compare timestamps of PAF file and synmap index file. PAF file may have been modified since synmap index creation.");
    }

    let file = File::open(index_file)?;
    let reader = BufReader::new(file);
    bincode::deserialize_from(reader).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to deserialize index: {:?}", e),
        )
    })
}

fn generate_records(paf_file: &str) -> io::Result<Vec<SyntenyRecord>> {
    let records = paf::parse_paf_file(paf_file)?;

    let file = File::create(index_path(paf_file))?;
    let writer = BufWriter::new(file);
    bincode::serialize_into(writer, &records).map_err(|e| {
        io::Error::new(
            io::ErrorKind::Other,
            format!("Failed to serialize index: {:?}", e),
        )
    })?;

    Ok(records)
}

fn parse_target_range(target_range: &str) -> io::Result<(String, (u64, u64))> {
    let parts: Vec<&str> = target_range.rsplitn(2, ':').collect();
    if parts.len() != 2 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Target range format should be `seq_name:start-end`",
        ));
    }

    let (start, end) = parse_range(&parts[0].split('-').collect::<Vec<_>>())?;
    Ok((parts[1].to_string(), (start, end)))
}

fn parse_range(range_parts: &[&str]) -> io::Result<(u64, u64)> {
    if range_parts.len() != 2 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Range format should be `start-end`",
        ));
    }

    let start = range_parts[0]
        .parse::<u64>()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "Invalid start value"))?;
    let end = range_parts[1]
        .parse::<u64>()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "Invalid end value"))?;

    if start >= end {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Start value must be less than end value",
        ));
    }

    Ok((start, end))
}

/// BEDPE-ish output: the requested window projected into the mate
/// coordinate system of every overlapping record.
fn output_projections(
    store: &SyntenyStore,
    target_name: &str,
    range_start: u64,
    range_end: u64,
) -> io::Result<()> {
    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());

    let features = store.features(Side::Target, target_name, range_start, range_end);
    info!(
        "{} alignments overlap {}:{}-{}",
        features.len(),
        target_name,
        range_start,
        range_end
    );
    for feature in features {
        let window_end = range_end.min(feature.end);
        let proj = project_window(&feature, range_start, window_end);
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            feature.mate.ref_name,
            proj.mate_start,
            proj.mate_end,
            feature.ref_name,
            proj.feature_start,
            proj.feature_end,
            feature.strand,
        )?;
    }
    Ok(())
}

/// Lay every sequence of one side along an axis, natural-ordered by name.
fn axis_regions(store: &SyntenyStore, side: Side) -> Vec<Region> {
    let index = store.sequence_index(side);
    let mut names: Vec<&str> = index.names().collect();
    names.sort_by(|a, b| natord::compare(a, b));
    names
        .into_iter()
        .map(|name| {
            let id = index.get_id(name).unwrap();
            Region {
                ref_name: name.to_string(),
                start: 0,
                end: index.get_len_from_id(id).unwrap(),
                reversed: false,
                assembly_name: store.assembly_name(side).to_string(),
            }
        })
        .collect()
}

fn output_dotplot(store: &SyntenyStore, width: f64, height: f64, draw_cigar: bool) -> io::Result<()> {
    let h_regions = axis_regions(store, Side::Query);
    let v_regions = axis_regions(store, Side::Target);
    if h_regions.is_empty() || v_regions.is_empty() {
        warn!("No alignments to plot");
        return Ok(());
    }

    let h_total: u64 = h_regions.iter().map(|r| r.len()).sum();
    let v_total: u64 = v_regions.iter().map(|r| r.len()).sum();
    let hview = View::new(h_regions.clone(), h_total as f64 / width, width);
    let vview = View::new(v_regions, v_total as f64 / height, height);

    let features = store.features_in_regions(Side::Query, &h_regions);
    let geometry = dotplot_geometry(&hview, &vview, &features, draw_cigar);

    for warning in &geometry.warnings {
        warn!("{} ({})", warning.message, warning.effect);
    }
    info!(
        "{} shapes, {} warnings",
        geometry.shapes.len(),
        geometry.warnings.len()
    );

    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    for item in &geometry.shapes {
        match &item.shape {
            DotplotShape::Point { x, y } => {
                writeln!(writer, "point\t{}\t{:.2}\t{:.2}", item.synteny_id, x, y)?;
            }
            DotplotShape::Line { x1, y1, x2, y2 } => {
                writeln!(
                    writer,
                    "line\t{}\t{:.2}\t{:.2}\t{:.2}\t{:.2}",
                    item.synteny_id, x1, y1, x2, y2
                )?;
            }
            DotplotShape::Polyline { points } => {
                let joined = points
                    .iter()
                    .map(|(x, y)| format!("{:.2},{:.2}", x, y))
                    .collect::<Vec<_>>()
                    .join(";");
                writeln!(writer, "polyline\t{}\t{}", item.synteny_id, joined)?;
            }
        }
    }
    Ok(())
}

fn print_stats(store: &SyntenyStore) {
    println!("Number of alignment records: {}", store.len());
    println!(
        "Query sequences: {}",
        store.sequence_index(Side::Query).len()
    );
    println!(
        "Target sequences: {}",
        store.sequence_index(Side::Target).len()
    );

    let total_block: u64 = store.records().iter().map(|r| r.block_len).sum();
    println!("Total aligned block length: {}", total_block);

    let identities: Vec<f64> = store
        .records()
        .par_iter()
        .filter_map(|record| {
            record
                .cigar
                .as_deref()
                .map(|cg| gap_compressed_identity(&synmap::cigar::parse_cigar(cg)))
        })
        .collect();
    if !identities.is_empty() {
        let mean = identities.iter().sum::<f64>() / identities.len() as f64;
        println!("Mean gap-compressed identity: {:.4}", mean);
    }

    for side in [Side::Query, Side::Target] {
        let label = match side {
            Side::Query => "query",
            Side::Target => "target",
        };
        let index = store.sequence_index(side);
        let mut names: Vec<&str> = index.names().collect();
        names.sort_by(|a, b| natord::compare(a, b));
        for name in names {
            let id = index.get_id(name).unwrap();
            println!("{}\t{}\t{}", label, name, index.get_len_from_id(id).unwrap());
        }
    }
}
