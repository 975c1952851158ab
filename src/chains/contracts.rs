//! OApp contract interfaces
//!
//! This module contains the Solidity interface definitions for the peering surface of LayerZero
//! OApps (`OAppCore` and `OAppOptionsType3`).

use alloy::sol;

sol! {
    /// Enforced options for one destination and message type.
    #[derive(Debug, PartialEq, Eq)]
    struct EnforcedOptionParam {
        uint32 eid;
        uint16 msgType;
        bytes options;
    }

    /// OApp peering and enforced options interface.
    #[sol(rpc)]
    #[derive(Debug)]
    interface IOApp {
        event PeerSet(uint32 eid, bytes32 peer);
        event EnforcedOptionSet(EnforcedOptionParam[] _enforcedOptions);

        function peers(uint32 _eid) external view returns (bytes32 peer);
        function setPeer(uint32 _eid, bytes32 _peer) external;
        function enforcedOptions(uint32 _eid, uint16 _msgType) external view returns (bytes memory);
        function setEnforcedOptions(EnforcedOptionParam[] calldata _enforcedOptions) external;
    }
}
