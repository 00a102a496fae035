use alloy::sol;

sol! {
    /// Subset of Multicall3 used to batch pool reads.
    #[sol(rpc)]
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct CallResult {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (CallResult[] memory returnData);
        function getBlockNumber() external view returns (uint256 blockNumber);
    }
}
