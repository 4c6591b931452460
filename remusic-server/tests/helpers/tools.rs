//! Fake external tools
//!
//! OCR scripts are called as `sh ocr.sh -o <out_dir> <image>`, conversion
//! scripts as `sh convert.sh <musicxml> <midi>`.

/// Writes `<stem>.musicxml` next to nothing else, like a well-behaved OCR run
pub const OCR_OK: &str = r#"
out="$2"
name=$(basename "$3")
stem="${name%.*}"
echo "recognizing $name"
printf '<score-partwise/>' > "$out/$stem.musicxml"
"#;

/// Writes its result under an unexpected name
pub const OCR_OTHER_NAME: &str = r#"
out="$2"
printf '<score-partwise/>' > "$out/output.XML"
"#;

/// Exits 0 without producing anything
pub const OCR_NO_OUTPUT: &str = r#"
echo "no staff lines detected"
"#;

/// Fails with diagnostics on stderr
pub const OCR_FAILS: &str = r#"
echo "loading model"
echo "checkpoint missing" 1>&2
exit 2
"#;

/// Copies the MusicXML to the MIDI path
pub const CONVERT_OK: &str = r#"
cp "$1" "$2"
"#;

/// Exits 0 without writing the MIDI file
pub const CONVERT_NO_OUTPUT: &str = r#"
echo "nothing to do"
"#;

/// Conversion script that leaves a marker file at `marker` when it runs
pub fn convert_with_marker(marker: &std::path::Path) -> String {
    format!("touch '{}'\ncp \"$1\" \"$2\"\n", marker.display())
}

/// Takes a second before writing, long enough to act on a running score
pub const OCR_SLOW: &str = r#"
sleep 1
out="$2"
name=$(basename "$3")
stem="${name%.*}"
mkdir -p "$out"
printf '<score-partwise/>' > "$out/$stem.musicxml"
"#;
