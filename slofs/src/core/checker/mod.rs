// SPDX-License-Identifier: MIT

mod types;

pub use types::{
    Finding, ReportDisplay, ReportDisplayOpts, Severity, VerifierOptionsLike, VerifyPhases,
    VerifyReport,
};

pub use crate::core::errors::{FsCheckerError, FsCheckerResult};

type PhaseFn<C, O> = fn(&mut C, &O, &mut VerifyReport) -> FsCheckerResult<()>;

/// Trait for verifying the integrity of a filesystem.
///
/// Implementations perform read-only consistency checks (superblock,
/// geometry, allocation maps, records, directory tree). Problems found on
/// disk are pushed to the report as findings; only failures of the checker
/// itself (unreadable store) are returned as errors.
pub trait FsChecker: Sized {
    type Options: VerifierOptionsLike + Default;

    fn check_with(&mut self, opt: &Self::Options) -> FsCheckerResult<VerifyReport> {
        let phases: [(VerifyPhases, PhaseFn<Self, Self::Options>); 6] = [
            (VerifyPhases::BOOT, Self::check_boot),
            (VerifyPhases::GEOMETRY, Self::check_geometry),
            (VerifyPhases::CHAIN, Self::check_chain),
            (VerifyPhases::ROOT, Self::check_root),
            (VerifyPhases::CROSSREF, Self::check_cross_reference),
            (VerifyPhases::CONTENT, Self::check_content),
        ];

        let mut rep = VerifyReport::default();
        for (phase, f) in phases {
            if !opt.phases().contains(phase) {
                continue;
            }
            f(self, opt, &mut rep)?;
            if opt.fail_fast() && rep.has_error() {
                break;
            }
        }
        Ok(rep)
    }

    fn check_all(&mut self) -> FsCheckerResult<VerifyReport> {
        self.check_with(&Self::Options::default())
    }

    fn check_boot(&mut self, _opt: &Self::Options, _rep: &mut VerifyReport) -> FsCheckerResult<()> {
        Ok(())
    }

    fn check_geometry(
        &mut self,
        _opt: &Self::Options,
        _rep: &mut VerifyReport,
    ) -> FsCheckerResult<()> {
        Ok(())
    }

    fn check_chain(
        &mut self,
        _opt: &Self::Options,
        _rep: &mut VerifyReport,
    ) -> FsCheckerResult<()> {
        Ok(())
    }

    fn check_root(&mut self, _opt: &Self::Options, _rep: &mut VerifyReport) -> FsCheckerResult<()> {
        Ok(())
    }

    fn check_cross_reference(
        &mut self,
        _opt: &Self::Options,
        _rep: &mut VerifyReport,
    ) -> FsCheckerResult<()> {
        Ok(())
    }

    fn check_content(
        &mut self,
        _opt: &Self::Options,
        _rep: &mut VerifyReport,
    ) -> FsCheckerResult<()> {
        Ok(())
    }
}
