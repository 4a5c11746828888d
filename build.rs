use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Create config template if it doesn't exist
    let out_dir = env::var("OUT_DIR").unwrap_or_else(|_| "./".to_string());
    let template_path = Path::new(&out_dir).join("../../../config.template.toml");

    let template = r#"# msebridge configuration template
# Copy this file to 'config.toml' and adjust the values

# Access units per acknowledgement for MediaSource playback
access_unit_size = 16

# Append the Vorbis padding suffix to audio units
audio_padding = true

# Capacity of the coordinator command queue
command_buffer = 100
"#;

    let _ = fs::write(template_path, template);
    println!("cargo:rerun-if-changed=build.rs");
}
