use alloy::{
    primitives::{Address, Bytes, U256},
    sol,
    sol_types::SolCall,
};

sol! {
    /// The governance module interface.
    ///
    /// The module is a Zodiac-style module: it executes transactions on its `target`, with the
    /// permissions of its `avatar`. It is deployed without constructor arguments and must be
    /// initialized exactly once.
    #[derive(Debug, PartialEq, Eq)]
    interface IGovernanceModule {
        function initialize(
            address owner,
            address token,
            uint256 quorumNumerator,
            uint256 minParticipation,
            uint256 voteLength,
            uint256 versionTag
        ) external;

        function setAvatar(address avatar) external;

        function setTarget(address target) external;

        function avatar() external view returns (address);

        function target() external view returns (address);

        function initialized() external view returns (bool);

        function owner() external view returns (address);
    }
}

/// Parameters bound into the module by `initialize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleConfig {
    /// The Safe; owner context during initialization and the eventual avatar.
    pub avatar: Address,
    /// The voting token.
    pub token: Address,
    /// Quorum numerator in 18-decimal fixed point.
    pub quorum_numerator: U256,
    /// Minimum participation in 18-decimal fixed point.
    pub min_participation: U256,
    /// Voting period, in seconds.
    pub vote_length: U256,
    /// Passed through verbatim; its meaning is defined by the module implementation.
    pub version_tag: U256,
}

impl ModuleConfig {
    /// ABI-encoded `initialize(...)` calldata.
    #[must_use]
    pub fn initialize_calldata(&self) -> Bytes {
        IGovernanceModule::initializeCall {
            owner: self.avatar,
            token: self.token,
            quorumNumerator: self.quorum_numerator,
            minParticipation: self.min_participation,
            voteLength: self.vote_length,
            versionTag: self.version_tag,
        }
        .abi_encode()
        .into()
    }
}

/// ABI-encoded `setAvatar(avatar)` calldata.
#[must_use]
pub fn set_avatar_calldata(avatar: Address) -> Bytes {
    IGovernanceModule::setAvatarCall { avatar }.abi_encode().into()
}

/// ABI-encoded `setTarget(target)` calldata.
#[must_use]
pub fn set_target_calldata(target: Address) -> Bytes {
    IGovernanceModule::setTargetCall { target }.abi_encode().into()
}
