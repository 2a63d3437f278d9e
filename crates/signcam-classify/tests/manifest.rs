use signcam_classify::ModelManifest;

#[test]
fn relative_model_path_resolves_against_manifest_dir() {
    let dir = tempfile::tempdir().unwrap();
    let manifest_path = dir.path().join("sign.json");
    std::fs::write(
        &manifest_path,
        r#"{"model": "sign.onnx", "labels": ["None", "wave"], "input_edge": 96, "num_threads": 2}"#,
    )
    .unwrap();

    let manifest = ModelManifest::load(&manifest_path).unwrap();
    assert_eq!(manifest.model, dir.path().join("sign.onnx"));
    assert_eq!(manifest.labels, ["None", "wave"]);
    assert_eq!(manifest.input_edge, 96);
    assert_eq!(manifest.num_threads, 2);
}

#[test]
fn absolute_model_path_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let manifest_path = dir.path().join("sign.json");
    std::fs::write(
        &manifest_path,
        r#"{"model": "/opt/models/sign.onnx", "labels": ["None"]}"#,
    )
    .unwrap();

    let manifest = ModelManifest::load(&manifest_path).unwrap();
    assert_eq!(
        manifest.model,
        std::path::PathBuf::from("/opt/models/sign.onnx")
    );
}

#[test]
fn missing_manifest_is_an_io_error() {
    let err = ModelManifest::load("/definitely/not/here.json").unwrap_err();
    assert!(matches!(err, signcam_classify::ClassifyError::ManifestIo(_)));
}
