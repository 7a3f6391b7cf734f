fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    // Chip cfgs (esp32, esp32s3, ...) select the I2S slot layout fields.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }
}
