use {
    anyhow::Result,
    clap::{value_parser, Arg, ArgAction, Command},
    gpiomem::{Level, Mode, GPIO},
};

// pinctl -n 17 --out --high
// pinctl -n 4 --in --read
fn main() -> Result<()> {
    let matches = Command::new("pinctl - GPIO pin control tool")
        .about("Drive and read Raspberry Pi GPIO pins through the /dev/gpiomem window")
        .disable_version_flag(true)
        .arg(
            Arg::new("pin")
                .short('n')
                .long("pin")
                .help("Number of the GPIO pin to manage")
                .value_parser(value_parser!(usize))
                .default_value("2"),
        )
        .arg(
            Arg::new("in")
                .long("in")
                .help("Program the pin as an input")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("out")
                .long("out")
                .help("Program the pin as an output (the default)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("read")
                .long("read")
                .help("Print the pin's current level")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("high")
                .long("high")
                .help("Drive the pin high")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("low")
                .long("low")
                .help("Drive the pin low (the default)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("clean")
                .long("clean")
                .help("Unmap the register window and exit")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let number = matches
        .get_one("pin")
        .copied()
        .expect("pin number must be an integer");
    let mode = if matches.get_flag("in") {
        Mode::Input
    } else {
        Mode::Output
    };

    let gpio = GPIO::open()?;
    let pin = gpio.setup(number, mode);

    if matches.get_flag("clean") {
        drop(pin);
        gpio.cleanup()?;
        return Ok(());
    }

    if matches.get_flag("read") {
        println!("{}", pin.read());
    } else if matches.get_flag("high") {
        gpio.output(number, Level::High);
    } else {
        pin.set_low();
    }

    Ok(())
}
