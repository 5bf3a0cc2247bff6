use std::path::PathBuf;

use anyhow::*;
use log::*;
use structopt::*;

use unrgz::*;

#[derive(Debug, StructOpt)]
#[structopt(name = "unrgz", about = "Unpacks an RGZ archive into a directory")]
struct Opt {
    /// Pass multiple times for additional verbosity (debug, trace)
    #[structopt(short, long, parse(from_occurrences))]
    verbosity: usize,

    /// Only print errors
    #[structopt(short, long)]
    quiet: bool,

    /// Directory to unpack into (created if it doesn't exist)
    #[structopt(short, long = "dest-dir", default_value = ".")]
    dest_dir: PathBuf,

    /// Prints the entries in the archive instead of extracting them.
    #[structopt(short = "n", long)]
    dry_run: bool,

    #[structopt(name("RGZ file"))]
    rgz_path: PathBuf,
}

fn main() -> Result<()> {
    let args = Opt::from_args();

    let mut errlog = stderrlog::new();
    errlog.quiet(args.quiet);
    // Info by default, like the archiver's own tools.
    errlog.verbosity(args.verbosity + 2);
    errlog.init()?;

    let mut decoder = open_archive(&args.rgz_path)
        .with_context(|| format!("Couldn't open {}", args.rgz_path.display()))?;

    if args.dry_run {
        print_entries(&mut decoder)
    } else {
        let extractor = Extractor::new(&args.dest_dir).with_context(|| {
            format!("Couldn't use {} as a destination", args.dest_dir.display())
        })?;
        extract_all(&mut decoder, &extractor)
            .with_context(|| format!("Couldn't unpack {}", args.rgz_path.display()))?;
        Ok(())
    }
}

fn print_entries<R: std::io::Read>(decoder: &mut Decoder<R>) -> Result<()> {
    loop {
        // File contents we don't read get skipped by the decoder.
        match decoder.next_directive()? {
            Directive::Directory { path } => println!("{}/", path.replace('\\', "/")),
            Directive::File {
                path,
                content_length,
                ..
            } => println!("{} ({} bytes)", path.replace('\\', "/"), content_length),
            Directive::End => break,
        }
    }
    debug!("Listed {} bytes of archive", decoder.offset());
    Ok(())
}
