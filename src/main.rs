extern crate clap;

use crate::clap::Parser;
use pcsf::cli::*;

pub fn main() {
    Cli::parse().run();
}
