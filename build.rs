#![forbid(unsafe_code)]

fn main() {
    // Build information reported by the /version endpoint.
    build_data::set_GIT_BRANCH();
    build_data::set_GIT_COMMIT_SHORT();
    build_data::set_GIT_DIRTY();
    build_data::set_SOURCE_TIMESTAMP();  // Using BUILD_TIMESTAMP makes build unreproducible.
    build_data::set_RUSTC_VERSION();

    // The migrations are embedded by sqlx::migrate!, so a new or edited
    // migration file has to trigger a rebuild.
    println!("cargo:rerun-if-changed=migrations");
}
