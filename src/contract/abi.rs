//! Solidity bindings for the Wave Portal contract.

use alloy_sol_types::sol;

sol! {
    /// A wave as stored by the contract.
    #[derive(Debug, PartialEq, Eq)]
    struct Wave {
        address waver;
        string message;
        uint256 timestamp;
    }

    /// Emitted once per successful `wave` call.
    #[derive(Debug, PartialEq, Eq)]
    event NewWave(address indexed from, uint256 timestamp, string message);

    function getAllWaves() external view returns (Wave[] memory);

    function getTotalWaves() external view returns (uint256);

    function wave(string memory message) external;
}
