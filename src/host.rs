//! Host-facing request surface.
//!
//! Deliberately thin: no queue/doorbell/PCIe machinery (that's explicitly
//! out of scope), just the minimum `submitIO`/`getLPNInfo`/`getUsedPageCount`
//! calls a driver-shaped caller needs. A request spanning several LPNs is
//! split into one sub-request per LPN (each gets its own `reqSubID`), and
//! the request as a whole completes when its slowest sub-request does,
//! mirroring how a multi-page host read/write only retires once every page
//! lands.

use tracing::trace;

use crate::error::{Result, SimError};
use crate::ftl::Ftl;
use crate::icl::Cache;
use crate::pal::Pal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOp {
    Read,
    Write,
    Flush,
    Trim,
}

#[derive(Debug, Clone, Copy)]
pub struct HostRequest {
    pub req_id: u64,
    pub op: HostOp,
    pub start_lpn: u64,
    pub lpn_count: u32,
    pub arrival: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct HostCompletion {
    pub req_id: u64,
    pub finish_tick: u64,
}

/// Split `req` into per-LPN sub-requests, submit each, and report the
/// request's overall completion as the latest of its sub-requests.
pub fn submit_io(
    cache: &mut Cache,
    ftl: &mut Ftl,
    pal: &mut Pal,
    req: HostRequest,
) -> Result<HostCompletion> {
    if req.lpn_count == 0 {
        return Err(SimError::InvalidOpcode(
            "request spans zero LPNs".to_string(),
        ));
    }

    let mut finish = req.arrival;
    for sub_id in 0..req.lpn_count {
        let lpn = req.start_lpn + sub_id as u64;
        let sub_finish = match req.op {
            HostOp::Read => cache.read(ftl, pal, lpn, req.arrival)?,
            HostOp::Write => cache.write(ftl, pal, lpn, req.arrival)?,
            HostOp::Trim => {
                cache.trim(ftl, lpn)?;
                req.arrival
            }
            HostOp::Flush => cache.flush_all(ftl, pal, req.arrival)?,
        };
        trace!(req_id = req.req_id, sub_id, lpn, sub_finish, "sub-request complete");
        finish = finish.max(sub_finish);

        if matches!(req.op, HostOp::Flush) {
            // A flush has no per-LPN meaning; one call covers the whole request.
            break;
        }
    }

    Ok(HostCompletion {
        req_id: req.req_id,
        finish_tick: finish,
    })
}

/// Whether `lpn` currently has a backing physical page, and where.
pub fn get_lpn_info(ftl: &Ftl, lpn: u64) -> Option<(u64, u32)> {
    ftl.peek_mapping(lpn)
}

pub fn get_used_page_count(ftl: &Ftl) -> usize {
    ftl.mapped_page_count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ftl::gc::{GcConfig, GcMode, VictimPolicy};
    use crate::geometry::{Geometry, PageAllocation, SuperblockMask};
    use crate::icl::eviction::EvictionPolicyKind;
    use crate::latency::{LatencyTable, NandType};

    fn harness() -> (Cache, Ftl, Pal) {
        let geometry = Geometry {
            channel: 1,
            package: 1,
            die: 1,
            plane: 1,
            block: 8,
            page: 4,
            page_size: 4096,
            lba_size: 512,
            io_unit_size: 4096,
            over_provisioning_ratio: 0.0,
        };
        let gc = GcConfig {
            mode: GcMode::Threshold,
            policy: VictimPolicy::Greedy,
            threshold: 0.1,
            reclaim_blocks: 1,
            reclaim_threshold: 0.2,
            erase_threshold: u64::MAX,
        };
        let ftl = Ftl::new(geometry, gc);
        let latency = LatencyTable::new(NandType::Slc, 200, 4096);
        let pal = Pal::new(
            geometry,
            latency,
            PageAllocation::parse("CWDP").unwrap(),
            SuperblockMask::default(),
            false,
        );
        let cache = Cache::new(4, 2, EvictionPolicyKind::Lru, true, true, false, 1, 1.0, 4096, 1, 1);
        (cache, ftl, pal)
    }

    #[test]
    fn multi_lpn_write_completes_at_slowest_sub_request() {
        let (mut cache, mut ftl, mut pal) = harness();
        let req = HostRequest {
            req_id: 1,
            op: HostOp::Write,
            start_lpn: 0,
            lpn_count: 4,
            arrival: 0,
        };
        let completion = submit_io(&mut cache, &mut ftl, &mut pal, req).unwrap();
        assert!(completion.finish_tick >= req.arrival);
        assert_eq!(completion.req_id, 1);
    }

    #[test]
    fn zero_length_request_is_rejected() {
        let (mut cache, mut ftl, mut pal) = harness();
        let req = HostRequest {
            req_id: 2,
            op: HostOp::Read,
            start_lpn: 0,
            lpn_count: 0,
            arrival: 0,
        };
        assert!(submit_io(&mut cache, &mut ftl, &mut pal, req).is_err());
    }

    #[test]
    fn get_lpn_info_reflects_writes() {
        let (mut cache, mut ftl, mut pal) = harness();
        assert_eq!(get_lpn_info(&ftl, 5), None);
        cache.write(&mut ftl, &mut pal, 5, 0).unwrap();
        cache.flush_all(&mut ftl, &mut pal, 10).unwrap();
        assert!(get_lpn_info(&ftl, 5).is_some());
    }
}
