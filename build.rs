//! Compiles the WiFi credentials and dashboard endpoint into the firmware.
//!
//! Values come from the process environment or a `.env` file next to this
//! script. Missing values compile to empty strings; the firmware then skips
//! the upload and logs why.

const KEYS: [&str; 5] = ["WIFI_SSID", "WIFI_PASSWORD", "UPLOAD_HOST", "UPLOAD_PORT", "UPLOAD_PATH"];

fn main() {
    println!("cargo:rerun-if-changed=.env");
    if let Err(e) = dotenvy::dotenv() {
        println!("cargo:warning=no .env file loaded ({e})");
    }

    for key in KEYS {
        println!("cargo:rerun-if-env-changed={key}");
        let value = std::env::var(key).unwrap_or_default();
        println!("cargo:rustc-env={key}={value}");
    }

    println!("cargo:rustc-link-arg=-Tlinkall.x");
}
