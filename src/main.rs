use apt_repository::{
    update_repository, Compression, ControlExtractor, DpkgDeb, HashAlgorithm, RepositoryLayout,
    DEFAULT_HASH_ALGORITHMS,
};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(version, about)]
struct Args {
    #[clap(long, default_value = ".", env = "FLATREPO_ROOT")]
    /// Repository root; all other paths are relative to it.
    root: PathBuf,

    #[clap(long, default_value = "debs")]
    /// Directory holding the .deb files, also used as the Filename prefix.
    archives_dir: PathBuf,

    #[clap(long, default_value = "repo_config.json")]
    /// JSON document rendered into the Release file.
    config: PathBuf,

    #[clap(long, default_value = "Packages")]
    /// Name of the Packages index.
    packages: PathBuf,

    #[clap(long, default_value = "Release")]
    /// Name of the Release file.
    release: PathBuf,

    #[clap(long = "compression", default_values_t = vec![Compression::Bzip2])]
    /// Compressed index formats to write (bzip2, gzip).
    compressions: Vec<Compression>,

    #[clap(long)]
    /// Add SHA512 checksums to every stanza.
    sha512: bool,

    #[clap(long)]
    /// Keep directory listing order instead of sorting by file name.
    unsorted: bool,

    #[clap(long, default_value = "dpkg-deb", env = "DPKG_DEB")]
    /// dpkg-deb program used to read control data.
    dpkg_deb: PathBuf,

    #[clap(flatten)]
    logging: flatrepo::logging::LoggingArgs,
}

impl Args {
    fn layout(&self) -> RepositoryLayout {
        let mut hash_algorithms = DEFAULT_HASH_ALGORITHMS.to_vec();
        if self.sha512 {
            hash_algorithms.push(HashAlgorithm::Sha512);
        }

        RepositoryLayout {
            root: self.root.clone(),
            archives_dir: self.archives_dir.clone(),
            packages_file: self.packages.clone(),
            compressions: self.compressions.clone(),
            release_file: self.release.clone(),
            config_file: self.config.clone(),
            hash_algorithms,
            sort: !self.unsorted,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    args.logging.init();

    let layout = args.layout();
    let extractor =
        ControlExtractor::with_defaults(DpkgDeb::with_program(&args.dpkg_deb), &args.root);

    let summary = match update_repository(&layout, &extractor) {
        Ok(summary) => summary,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::from(flatrepo::exit_code(&e));
        }
    };

    if summary.bootstrapped {
        return ExitCode::from(flatrepo::EXIT_SUCCESS);
    }

    for skipped in &summary.skipped {
        log::warn!("Not indexed: {}: {}", skipped.path.display(), skipped.reason);
    }
    log::info!(
        "Indexed {} package(s), skipped {}",
        summary.indexed.len(),
        summary.skipped.len()
    );
    for path in &summary.written {
        log::debug!("Wrote {}", path.display());
    }
    log::info!("Repository metadata updated successfully!");

    ExitCode::from(flatrepo::EXIT_SUCCESS)
}
