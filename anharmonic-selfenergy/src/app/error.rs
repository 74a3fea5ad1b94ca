// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Error
//! The error type for the binary

use miette::Diagnostic;

#[derive(thiserror::Error, Debug, Diagnostic)]
pub(crate) enum AnharmonicError {
    #[error(transparent)]
    #[diagnostic(code(anharmonic::io_error))]
    Io(#[from] crate::error::IOError),
    #[error(transparent)]
    #[diagnostic(code(anharmonic::config_error))]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    #[diagnostic(code(anharmonic::build_error))]
    Build(#[from] crate::error::BuildError),
    #[error(transparent)]
    #[diagnostic(code(anharmonic::self_energy_error))]
    SelfEnergy(#[from] crate::self_energy::SelfEnergyError),
    #[error(transparent)]
    #[diagnostic(code(anharmonic::output_error))]
    Output(#[from] crate::postprocessor::PostProcessorError),
    #[error("target {index} is invalid: {reason}")]
    #[diagnostic(code(anharmonic::target_error))]
    Target { index: usize, reason: String },
}
