//! Metadata package fixtures served over a mock HTTP server

use std::io::Write;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// AICC companion extensions, in bundling order
pub const AICC_EXTENSIONS: [&str; 5] = ["au", "crs", "cst", "des", "ort"];

/// Build an in-memory ZIP archive
pub fn zip_bytes(files: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, content) in files {
        writer.start_file(name.as_str(), options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Catalog CSV whose image URLs point at `/img/<id>.png` on `server_uri`
pub fn catalog_csv(server_uri: &str, ids: &[&str]) -> String {
    let mut csv = String::from("ID,Title,ImageUrl\n");
    for id in ids {
        csv.push_str(&format!("{id},Title of {id},{server_uri}/img/{id}.png\n"));
    }
    csv
}

/// Image URL used in [`catalog_csv`] for `id`
pub fn image_url(server_uri: &str, id: &str) -> String {
    format!("{server_uri}/img/{id}.png")
}

/// CSVX package holding only the catalog, nested in a folder
pub fn csvx_package(catalog: &str) -> Vec<u8> {
    zip_bytes(&[(
        "export/Catalog_Export.csv".to_string(),
        catalog.as_bytes().to_vec(),
    )])
}

/// AICC package holding the given `(id, extension)` companion files
pub fn aicc_package(files: &[(&str, &str)]) -> Vec<u8> {
    let entries: Vec<(String, Vec<u8>)> = files
        .iter()
        .map(|(id, ext)| {
            (
                format!("aicc/{id}.{ext}"),
                format!("{ext} for {id}").into_bytes(),
            )
        })
        .collect();
    zip_bytes(&entries)
}

/// Serve both packages at `/packages/<FORMAT>.zip`
pub async fn mount_packages(server: &MockServer, csvx: Vec<u8>, aicc: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path("/packages/CSVX.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(csvx))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/packages/AICC.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(aicc))
        .mount(server)
        .await;
}

/// Serve a small PNG-ish body for every id, each expected exactly `times`
pub async fn mount_images(server: &MockServer, ids: &[&str], times: u64) {
    for id in ids {
        Mock::given(method("GET"))
            .and(path(format!("/img/{id}.png")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(format!("png {id}").into_bytes()))
            .expect(times)
            .mount(server)
            .await;
    }
}
