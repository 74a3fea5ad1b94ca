use anharmonic_selfenergy::app::run;

fn main() -> color_eyre::Result<()> {
    run()
}
