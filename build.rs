fn main() {
    // ESP-IDF builds need the sysenv exported for the linker; host builds
    // (tests, fuzzing) have nothing to generate.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
