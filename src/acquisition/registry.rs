/// How one required artifact is located once its source page is fetched.
#[derive(Debug, Clone)]
pub enum ArtifactSource {
    /// A direct, stable download link (library JARs such as GFC/protobuf/SLF4J).
    DirectUrl(&'static str),
    /// A CMS landing page that must be scraped for a link matching a pattern, then (for the
    /// IOCE bundle) a license-agreement form that must be located and submitted before the
    /// real download starts (§4.3, grounded on `cms_downloader.py::download_msdrg_files` /
    /// `download_ioce_files`).
    ScrapedPage {
        page_url: &'static str,
        link_pattern: &'static str,
        requires_license_agreement: bool,
    },
}

#[derive(Debug, Clone)]
pub struct RequiredArtifact {
    pub component: &'static str,
    /// Either an exact filename or a regex the extractor matches entries in a downloaded
    /// archive against (§4.3).
    pub file_pattern: &'static str,
    pub source: ArtifactSource,
}

/// Static table of everything a clean installation needs. Grounded directly on the constants in
/// `cms_downloader.py` (GFC_JAR, GRPC_JAR1/2, SLF4J_JAR/JAR2, MSDRG_URL, IOCE_URL,
/// JAVA_SOURCE_PATTERN, JAVA_STANDALONE_PATTERN).
pub fn required_artifacts() -> Vec<RequiredArtifact> {
    vec![
        RequiredArtifact {
            component: "gfc",
            file_pattern: "gfc-base-api-3.4.9.jar",
            source: ArtifactSource::DirectUrl(
                "https://github.com/3mcloud/GFC-Grouper-Foundation-Classes/releases/download/v3.4.9/gfc-base-api-3.4.9.jar",
            ),
        },
        RequiredArtifact {
            component: "grpc",
            file_pattern: "protobuf-java-3.22.2.jar",
            source: ArtifactSource::DirectUrl(
                "https://repo1.maven.org/maven2/com/google/protobuf/protobuf-java/3.22.2/protobuf-java-3.22.2.jar",
            ),
        },
        RequiredArtifact {
            component: "grpc",
            file_pattern: "protobuf-java-3.21.7.jar",
            source: ArtifactSource::DirectUrl(
                "https://repo1.maven.org/maven2/com/google/protobuf/protobuf-java/3.21.7/protobuf-java-3.21.7.jar",
            ),
        },
        RequiredArtifact {
            component: "slf4j",
            file_pattern: "slf4j-simple-2.0.9.jar",
            source: ArtifactSource::DirectUrl(
                "https://repo1.maven.org/maven2/org/slf4j/slf4j-simple/2.0.9/slf4j-simple-2.0.9.jar",
            ),
        },
        RequiredArtifact {
            component: "slf4j",
            file_pattern: "slf4j-api-2.0.9.jar",
            source: ArtifactSource::DirectUrl(
                "https://repo1.maven.org/maven2/org/slf4j/slf4j-api/2.0.9/slf4j-api-2.0.9.jar",
            ),
        },
        RequiredArtifact {
            component: "msdrg",
            file_pattern: r"^gov\.agency\.msdrg\.v\d+.*\.jar$",
            source: ArtifactSource::ScrapedPage {
                page_url: "https://www.cms.gov/medicare/payment/prospective-payment-systems/acute-inpatient-pps/ms-drg-classifications-and-software",
                link_pattern: "java-source.zip",
                requires_license_agreement: false,
            },
        },
        RequiredArtifact {
            component: "ioce",
            file_pattern: r"^gov\.agency\.ioce\.v\d+.*\.jar$",
            source: ArtifactSource::ScrapedPage {
                page_url: "https://www.cms.gov/medicare/coding-billing/outpatient-code-editor-oce/quarterly-release-files",
                link_pattern: "java-standalone",
                requires_license_agreement: true,
            },
        },
    ]
}
