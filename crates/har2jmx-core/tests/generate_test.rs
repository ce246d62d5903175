//! End-to-end conversion tests on a recorded two-page capture

// Internal imports (std, crate)
use std::path::PathBuf;

// External imports (alphabetized)
use har2jmx_core::{generate, AnnotationSourceKind, Config, Result};
use tempfile::TempDir;
use tokio::fs;

fn fixture(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
        .to_string_lossy()
        .to_string()
}

fn output(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).to_string_lossy().to_string()
}

#[tokio::test]
async fn test_two_page_capture_to_jmx() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = Config::new(fixture("two_pages.har"), output(&dir, "out/script.jmx"));

    let summary = generate(&config).await?;
    assert_eq!(summary.groups, 2);
    assert_eq!(summary.samplers, 3);
    assert!(summary.record_path.is_none());

    let jmx = fs::read_to_string(&summary.jmx_path).await?;
    assert!(jmx.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(jmx.contains("testname=\"PAGE_01 - /home\""));
    assert!(jmx.contains("testname=\"PAGE_02 - /cart\""));
    assert_eq!(jmx.matches("testname=\"Flow Control Action PAUSE\"").count(), 1);
    assert!(jmx.contains("<stringProp name=\"ActionProcessor.duration\">5000</stringProp>"));

    // the cached logo never becomes a sampler
    assert!(jmx.contains("testname=\"001 /home\""));
    assert!(jmx.contains("testname=\"002 /cart/add\""));
    assert!(jmx.contains("testname=\"003 /app.js\""));
    assert!(!jmx.contains("logo.png"));

    assert!(jmx.contains("<stringProp name=\"HTTPSampler.path\">/cart/add?src=home</stringProp>"));
    assert!(jmx.contains("<stringProp name=\"HTTPSampler.domain\">cdn.example.net</stringProp>"));
    assert!(jmx.contains("<stringProp name=\"Argument.value\">shop.example.com</stringProp>"));

    assert!(!jmx.contains("<stringProp name=\"Header.name\">Cookie</stringProp>"));
    assert!(!jmx.contains("If-None-Match"));
    assert!(!jmx.contains("Content-Length"));
    assert!(!jmx.contains(":authority"));
    assert!(!jmx.contains("ProxyControl"));
    Ok(())
}

#[tokio::test]
async fn test_record_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = Config::new(fixture("two_pages.har"), output(&dir, "script.jmx"));
    let record_out = output(&dir, "record.xml");
    config.record_out = Some(record_out.clone());

    let summary = generate(&config).await?;
    assert_eq!(summary.records, 3);
    assert_eq!(summary.record_path, Some(PathBuf::from(&record_out)));

    let jmx = fs::read_to_string(&summary.jmx_path).await?;
    assert!(jmx.contains("testname=\"View Results Tree\""));

    let record = fs::read_to_string(&record_out).await?;
    assert!(record.contains("<testResults version=\"1.2\">"));
    assert_eq!(record.matches("<httpSample ").count(), 3);
    assert!(record.contains("lb=\"002 /cart/add\""));
    assert!(record.contains("rc=\"302\""));
    assert!(record.contains(
        "<queryString class=\"java.lang.String\">sku=A-1&amp;qty=2&amp;note=a b</queryString>"
    ));
    assert!(record.contains("<redirectLocation class=\"java.lang.String\">/cart</redirectLocation>"));
    assert!(record.contains("console.log(&quot;ready&quot;);"));
    Ok(())
}

#[tokio::test]
async fn test_annotations_name_pages() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let csv = output(&dir, "annotations.csv");
    fs::write(
        &csv,
        "2024-05-07T09:59:59.900Z;TRANSACTION;welcome;start\n\
         2024-05-07T10:00:00.100Z;TRANSACTION;welcome;end\n\
         2024-05-07T10:00:04.900Z;TRANSACTION;add_to_cart;start\n\
         2024-05-07T10:00:05.100Z;TRANSACTION;add_to_cart;end\n",
    )
    .await?;

    let mut config = Config::new(fixture("two_pages.har"), output(&dir, "script.jmx"));
    config.annotation_source = AnnotationSourceKind::ExternalCsv;
    config.annotation_path = Some(csv);

    let summary = generate(&config).await?;
    assert_eq!(summary.groups, 2);
    let jmx = fs::read_to_string(&summary.jmx_path).await?;
    assert!(jmx.contains("testname=\"PAGE_01 - welcome\""));
    // the last exchange falls after every window and joins the nearest one
    assert!(jmx.contains("testname=\"PAGE_02 - add_to_cart\""));
    assert!(jmx.contains("testname=\"003 /app.js\""));
    Ok(())
}

#[tokio::test]
async fn test_missing_capture_is_an_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = Config::new(output(&dir, "missing.har"), output(&dir, "script.jmx"));
    assert!(generate(&config).await.is_err());
    assert!(!dir.path().join("script.jmx").exists());
    Ok(())
}
