//! Extraction of control metadata from `.deb` package archives.
//!
//! A [`ControlExtractor`] holds an ordered list of [`ControlProvider`]
//! strategies and returns the output of the first one that succeeds. The
//! default chain asks `dpkg-deb -f` first and falls back to reading the
//! `control.tar*` member of the archive directly.

use crate::error::ExtractionError;
use crate::{AptRepositoryError, Result};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// A strategy for obtaining the raw control stanza of a package archive.
pub trait ControlProvider {
    /// Short name used in diagnostics.
    fn name(&self) -> &str;

    /// Return the control text of `archive`.
    fn control(&self, archive: &Path) -> std::result::Result<String, ExtractionError>;
}

/// Runs `dpkg-deb -f <archive>` and returns its standard output.
#[derive(Debug, Clone)]
pub struct DpkgDeb {
    program: PathBuf,
}

impl DpkgDeb {
    /// Use `dpkg-deb` from `PATH`.
    pub fn new() -> Self {
        Self::with_program("dpkg-deb")
    }

    /// Use a specific `dpkg-deb` binary.
    pub fn with_program<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for DpkgDeb {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlProvider for DpkgDeb {
    fn name(&self) -> &str {
        "dpkg-deb"
    }

    fn control(&self, archive: &Path) -> std::result::Result<String, ExtractionError> {
        let program = self.program.display().to_string();
        let output = Command::new(&self.program)
            .arg("-f")
            .arg(archive)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ExtractionError::Launch {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ExtractionError::Status {
                program,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8(output.stdout)?;
        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyOutput);
        }
        Ok(text)
    }
}

/// Reads the `control` file out of the archive's `control.tar*` member.
///
/// The member is first copied to a transient file in `work_dir`; that file
/// is removed when extraction finishes, whether or not it succeeded.
#[derive(Debug, Clone)]
pub struct ControlMember {
    work_dir: PathBuf,
}

impl ControlMember {
    /// Place transient files in `work_dir`.
    pub fn new<P: Into<PathBuf>>(work_dir: P) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }
}

/// Compression of a `control.tar` member, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemberCompression {
    None,
    Gzip,
    Xz,
    Zstd,
}

impl MemberCompression {
    fn from_member_name(name: &str) -> Option<Self> {
        match name.strip_prefix("control.tar")? {
            "" => Some(Self::None),
            ".gz" => Some(Self::Gzip),
            ".xz" => Some(Self::Xz),
            ".zst" => Some(Self::Zstd),
            _ => None,
        }
    }

    fn decoder<'a, R: Read + 'a>(self, reader: R) -> std::io::Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Self::None => Box::new(reader),
            Self::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
            Self::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
            Self::Zstd => Box::new(zstd::stream::read::Decoder::new(reader)?),
        })
    }
}

impl ControlProvider for ControlMember {
    fn name(&self) -> &str {
        "control member"
    }

    fn control(&self, archive: &Path) -> std::result::Result<String, ExtractionError> {
        let mut reader = ar::Archive::new(BufReader::new(File::open(archive)?));

        while let Some(entry) = reader.next_entry() {
            let mut entry = entry?;
            let name = String::from_utf8_lossy(entry.header().identifier())
                .trim_end_matches('/')
                .to_string();
            if !name.starts_with("control.tar") {
                continue;
            }
            let compression = MemberCompression::from_member_name(&name)
                .ok_or_else(|| ExtractionError::UnsupportedMember(name.clone()))?;

            let mut transient = tempfile::Builder::new()
                .prefix(".control-")
                .suffix(&format!("-{}", name))
                .tempfile_in(&self.work_dir)?;
            std::io::copy(&mut entry, transient.as_file_mut())?;
            transient.as_file_mut().seek(SeekFrom::Start(0))?;

            return read_control_file(compression.decoder(BufReader::new(transient.as_file()))?);
        }

        Err(ExtractionError::MissingMember("control.tar".to_string()))
    }
}

/// Find `./control` in a control tarball and return it as text.
fn read_control_file<R: Read>(reader: R) -> std::result::Result<String, ExtractionError> {
    let mut tarball = tar::Archive::new(reader);

    for entry in tarball.entries()? {
        let mut entry = entry?;
        let is_control = {
            let path = entry.path()?;
            let path: &Path = &path;
            path.strip_prefix(".").unwrap_or(path) == Path::new("control")
        };
        if is_control {
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            return Ok(String::from_utf8(data)?);
        }
    }

    Err(ExtractionError::MissingMember("control".to_string()))
}

/// Tries each provider in order and returns the first successful result.
pub struct ControlExtractor {
    providers: Vec<Box<dyn ControlProvider>>,
}

impl ControlExtractor {
    /// Create an extractor with an explicit strategy list.
    pub fn new(providers: Vec<Box<dyn ControlProvider>>) -> Self {
        Self { providers }
    }

    /// The standard chain: `dpkg-deb`, then the control member read directly.
    pub fn with_defaults<P: Into<PathBuf>>(dpkg_deb: DpkgDeb, work_dir: P) -> Self {
        Self::new(vec![
            Box::new(dpkg_deb),
            Box::new(ControlMember::new(work_dir)),
        ])
    }

    /// Return the raw control text for `archive`.
    ///
    /// Fails with [`AptRepositoryError::Extraction`] listing every strategy's
    /// error when none of them succeeds.
    pub fn extract(&self, archive: &Path) -> Result<String> {
        let mut failures = Vec::new();

        for provider in &self.providers {
            match provider.control(archive) {
                Ok(text) => {
                    log::debug!("{}: control data from {}", archive.display(), provider.name());
                    return Ok(text);
                }
                Err(e) => {
                    log::debug!("{}: {} failed: {}", archive.display(), provider.name(), e);
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }

        if failures.is_empty() {
            failures.push("no extraction strategies configured".to_string());
        }
        Err(AptRepositoryError::extraction(archive, failures.join("; ")))
    }
}

impl Default for ControlExtractor {
    fn default() -> Self {
        Self::with_defaults(DpkgDeb::new(), ".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn control_tar(control: &str, with_dot: bool) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(control.len() as u64);
        header.set_mode(0o644);
        let path = if with_dot { "./control" } else { "control" };
        builder
            .append_data(&mut header, path, control.as_bytes())
            .unwrap();
        builder.into_inner().unwrap()
    }

    fn write_deb(path: &Path, member: &str, member_data: &[u8]) {
        let mut builder = ar::Builder::new(File::create(path).unwrap());
        let data: &[u8] = b"2.0\n";
        builder
            .append(&ar::Header::new(b"debian-binary".to_vec(), data.len() as u64), data)
            .unwrap();
        builder
            .append(
                &ar::Header::new(member.as_bytes().to_vec(), member_data.len() as u64),
                member_data,
            )
            .unwrap();
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    struct Failing;

    impl ControlProvider for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn control(&self, _archive: &Path) -> std::result::Result<String, ExtractionError> {
            Err(ExtractionError::EmptyOutput)
        }
    }

    #[test]
    fn test_member_compression_from_name() {
        assert_eq!(
            MemberCompression::from_member_name("control.tar.gz"),
            Some(MemberCompression::Gzip)
        );
        assert_eq!(
            MemberCompression::from_member_name("control.tar"),
            Some(MemberCompression::None)
        );
        assert_eq!(
            MemberCompression::from_member_name("control.tar.zst"),
            Some(MemberCompression::Zstd)
        );
        assert_eq!(MemberCompression::from_member_name("control.tar.lz4"), None);
    }

    #[test]
    fn test_control_member_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let deb = dir.path().join("foo_1.0_all.deb");
        let control = "Package: foo\nVersion: 1.0\nArchitecture: all\n";
        write_deb(&deb, "control.tar.gz", &gzip(&control_tar(control, true)));

        let text = ControlMember::new(work.path()).control(&deb).unwrap();

        assert_eq!(text, control);
        assert_eq!(entries(work.path()), 0);
    }

    #[test]
    fn test_control_member_xz_without_dot_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let deb = dir.path().join("bar.deb");
        let control = "Package: bar\nVersion: 2\n";
        let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
        encoder.write_all(&control_tar(control, false)).unwrap();
        write_deb(&deb, "control.tar.xz", &encoder.finish().unwrap());

        let text = ControlMember::new(dir.path()).control(&deb).unwrap();

        assert_eq!(text, control);
        assert_eq!(entries(dir.path()), 1);
    }

    #[test]
    fn test_control_member_zstd() {
        let dir = tempfile::tempdir().unwrap();
        let deb = dir.path().join("baz.deb");
        let control = "Package: baz\n";
        let compressed = zstd::stream::encode_all(&control_tar(control, true)[..], 3).unwrap();
        write_deb(&deb, "control.tar.zst", &compressed);

        assert_eq!(ControlMember::new(dir.path()).control(&deb).unwrap(), control);
    }

    #[test]
    fn test_transient_file_removed_on_tar_failure() {
        let dir = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let deb = dir.path().join("broken.deb");
        write_deb(&deb, "control.tar.gz", b"this is not gzip data");

        let result = ControlMember::new(work.path()).control(&deb);

        assert!(result.is_err());
        assert_eq!(entries(work.path()), 0);
    }

    #[test]
    fn test_control_member_missing() {
        let dir = tempfile::tempdir().unwrap();
        let deb = dir.path().join("nocontrol.deb");
        write_deb(&deb, "data.tar.gz", &gzip(b""));

        assert!(matches!(
            ControlMember::new(dir.path()).control(&deb),
            Err(ExtractionError::MissingMember(_))
        ));
    }

    #[test]
    fn test_control_member_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let deb = dir.path().join("odd.deb");
        write_deb(&deb, "control.tar.lz4", b"");

        assert!(matches!(
            ControlMember::new(dir.path()).control(&deb),
            Err(ExtractionError::UnsupportedMember(name)) if name == "control.tar.lz4"
        ));
    }

    #[test]
    fn test_dpkg_deb_launch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let provider = DpkgDeb::with_program(dir.path().join("no-such-dpkg-deb"));

        assert!(matches!(
            provider.control(&dir.path().join("x.deb")),
            Err(ExtractionError::Launch { .. })
        ));
    }

    // `sh -f <archive>` runs the archive as a script, so a plain script
    // stands in for what dpkg-deb prints.
    #[cfg(unix)]
    #[test]
    fn test_dpkg_deb_output_returned_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("foo.deb");
        std::fs::write(&archive, "printf 'Package: foo\\nVersion: 1.0\\n'\n").unwrap();

        let extractor = ControlExtractor::with_defaults(DpkgDeb::with_program("sh"), dir.path());

        assert_eq!(extractor.extract(&archive).unwrap(), "Package: foo\nVersion: 1.0\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_dpkg_deb_failure_status_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let deb = dir.path().join("foo.deb");
        let control = "Package: foo\nVersion: 2\n";
        write_deb(&deb, "control.tar.gz", &gzip(&control_tar(control, true)));

        assert!(matches!(
            DpkgDeb::with_program("false").control(&deb),
            Err(ExtractionError::Status { .. })
        ));

        let extractor = ControlExtractor::with_defaults(DpkgDeb::with_program("false"), dir.path());
        assert_eq!(extractor.extract(&deb).unwrap(), control);
    }

    #[cfg(unix)]
    #[test]
    fn test_dpkg_deb_empty_output_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let deb = dir.path().join("foo.deb");
        let control = "Package: foo\nVersion: 3\n";
        write_deb(&deb, "control.tar.gz", &gzip(&control_tar(control, true)));

        assert!(matches!(
            DpkgDeb::with_program("true").control(&deb),
            Err(ExtractionError::EmptyOutput)
        ));

        let extractor = ControlExtractor::with_defaults(DpkgDeb::with_program("true"), dir.path());
        assert_eq!(extractor.extract(&deb).unwrap(), control);
    }

    #[test]
    fn test_extractor_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let deb = dir.path().join("foo.deb");
        let control = "Package: foo\n";
        write_deb(&deb, "control.tar.gz", &gzip(&control_tar(control, true)));

        let extractor = ControlExtractor::with_defaults(
            DpkgDeb::with_program(dir.path().join("no-such-dpkg-deb")),
            dir.path(),
        );

        assert_eq!(extractor.extract(&deb).unwrap(), control);
    }

    #[test]
    fn test_extractor_reports_all_failures() {
        let dir = tempfile::tempdir().unwrap();
        let deb = dir.path().join("garbage.deb");
        std::fs::write(&deb, b"not an ar archive").unwrap();

        let extractor = ControlExtractor::new(vec![
            Box::new(Failing),
            Box::new(ControlMember::new(dir.path())),
        ]);

        match extractor.extract(&deb) {
            Err(AptRepositoryError::Extraction { archive, reason }) => {
                assert_eq!(archive, deb);
                assert!(reason.contains("failing: no control data produced"));
                assert!(reason.contains("control member"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
