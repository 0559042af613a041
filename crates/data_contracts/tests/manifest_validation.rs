use data_contracts::{ManifestError, SceneManifest};

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn length_mismatch_rejected() {
    let manifest = SceneManifest::new(
        strings(&["a/img_0.npy", "a/img_1.npy"]),
        strings(&["a/lbl_0.npy"]),
        strings(&["a", "a"]),
    );
    let err = manifest.validate().unwrap_err();
    assert_eq!(
        err,
        ManifestError::LengthMismatch {
            images: 2,
            labels: 1,
            scenes: 2
        }
    );
}

#[test]
fn blank_scene_rejected() {
    let manifest = SceneManifest::new(
        strings(&["a/img_0.npy"]),
        strings(&["a/lbl_0.npy"]),
        strings(&[" "]),
    );
    assert!(matches!(
        manifest.validate(),
        Err(ManifestError::EmptyEntry {
            field: "scene",
            position: 0
        })
    ));
}

#[test]
fn scene_types_sorted_and_unique() {
    let manifest = SceneManifest::new(
        strings(&["x", "y", "z", "w"]),
        strings(&["x", "y", "z", "w"]),
        strings(&["ai_002", "ai_001", "ai_002", "ai_000"]),
    );
    assert!(manifest.validate().is_ok());
    assert_eq!(manifest.scene_types(), strings(&["ai_000", "ai_001", "ai_002"]));
}

#[test]
fn deserializes_original_field_names() -> anyhow::Result<()> {
    let raw = r#"{"image_pths": ["s/i.npy"], "label_pths": ["s/l.npy"], "scenes": ["s"]}"#;
    let manifest: SceneManifest = serde_json::from_str(raw)?;
    assert_eq!(manifest.len(), 1);
    assert_eq!(manifest.image_paths[0], "s/i.npy");
    Ok(())
}
