/// Info flow entrypoint.
pub(crate) fn info() {
    println!(
        "Freemius Toolkit version: v{}",
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("Created by {}", env!("CARGO_PKG_AUTHORS"));
    println!("Homepage: {}", env!("CARGO_PKG_HOMEPAGE"));
    println!();
}
