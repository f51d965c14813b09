//! Command-line configuration for the server binary.

use clap::Parser;
use shared::ConfigurationError;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
pub struct Args {
    /// Address to bind the TCP server to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[clap(short, long, default_value = "7070")]
    pub port: u16,

    /// Multicast group for top-position announcements
    #[clap(long, default_value = "239.255.32.32")]
    pub multicast_group: Ipv4Addr,

    /// Port of the multicast group
    #[clap(long, default_value = "7071")]
    pub multicast_port: u16,

    /// Seconds between ranking recomputations
    #[clap(short, long, default_value = "60")]
    pub ranking_interval: i64,

    /// Directory holding the hotels/users/reviews snapshots
    #[clap(short, long, default_value = "data")]
    pub data_dir: PathBuf,
}

impl Args {
    /// Rejects configurations the server must not start with. A zero or
    /// negative ranking interval would otherwise degenerate into a busy
    /// loop.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.ranking_interval <= 0 {
            return Err(ConfigurationError::InvalidRankingInterval(
                self.ranking_interval,
            ));
        }
        if !self.data_dir.is_dir() {
            return Err(ConfigurationError::MissingDataDir(
                self.data_dir.display().to_string(),
            ));
        }
        Ok(())
    }

    pub fn ranking_period(&self) -> Duration {
        Duration::from_secs(self.ranking_interval as u64)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(ranking_interval: i64, data_dir: PathBuf) -> Args {
        Args {
            host: "127.0.0.1".to_string(),
            port: 7070,
            multicast_group: Ipv4Addr::new(239, 255, 32, 32),
            multicast_port: 7071,
            ranking_interval,
            data_dir,
        }
    }

    #[test]
    fn nonpositive_ranking_interval_is_rejected() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            args(0, dir.path().to_path_buf()).validate(),
            Err(ConfigurationError::InvalidRankingInterval(0))
        ));
        assert!(matches!(
            args(-5, dir.path().to_path_buf()).validate(),
            Err(ConfigurationError::InvalidRankingInterval(-5))
        ));
        assert!(args(60, dir.path().to_path_buf()).validate().is_ok());
    }

    #[test]
    fn missing_data_dir_is_rejected() {
        assert!(matches!(
            args(60, PathBuf::from("/definitely/not/here")).validate(),
            Err(ConfigurationError::MissingDataDir(_))
        ));
    }
}
