use crate::error::{Error, Result};
use crate::server::ServerId;

pub const HELP: &str = concat!(
    "Commands:\n",
    "  a: Add random load        s: Add server\n",
    "  d: Remove server          r: Rebalance\n",
    "  m: Switch algorithm       1-9: Add load to server\n",
    "  +: Increase random load   -: Decrease random load\n",
    "  h: Help                   q: Quit\n",
);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    AddRandomLoad,
    AddServer,
    RemoveServer,
    Rebalance,
    CycleAlgorithm,
    IncreaseRandomLoad,
    DecreaseRandomLoad,
    LoadServer(ServerId),
    Help,
    Quit,
}

impl Command {
    pub fn from_char(key: char) -> Result<Self> {
        let command = match key {
            'a' => Command::AddRandomLoad,
            's' => Command::AddServer,
            'd' => Command::RemoveServer,
            'r' => Command::Rebalance,
            'm' => Command::CycleAlgorithm,
            '+' => Command::IncreaseRandomLoad,
            '-' => Command::DecreaseRandomLoad,
            'h' => Command::Help,
            'q' => Command::Quit,
            '1'..='9' => match key.to_digit(10) {
                Some(digit) => Command::LoadServer(digit),
                None => return Err(Error::UnknownCommand(key)),
            },
            _ => return Err(Error::UnknownCommand(key)),
        };
        Ok(command)
    }

    pub fn key(self) -> char {
        match self {
            Command::AddRandomLoad => 'a',
            Command::AddServer => 's',
            Command::RemoveServer => 'd',
            Command::Rebalance => 'r',
            Command::CycleAlgorithm => 'm',
            Command::IncreaseRandomLoad => '+',
            Command::DecreaseRandomLoad => '-',
            Command::LoadServer(server_id) => char::from_digit(server_id, 10).unwrap_or('?'),
            Command::Help => 'h',
            Command::Quit => 'q',
        }
    }
}

pub fn parse_commands(input: &str) -> Result<Vec<Command>> {
    input
        .chars()
        .filter(|key| !key.is_whitespace())
        .map(Command::from_char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_key_maps_back_to_itself() {
        for key in "asdrm+-hq123456789".chars() {
            let command = Command::from_char(key).unwrap();
            assert_eq!(command.key(), key);
        }
    }

    #[test]
    fn digits_address_servers() {
        assert_eq!(Command::from_char('7').unwrap(), Command::LoadServer(7));
        assert_eq!(Command::from_char('0'), Err(Error::UnknownCommand('0')));
    }

    #[test]
    fn scripts_skip_whitespace_and_reject_unknown_keys() {
        let commands = parse_commands("a s\n r").unwrap();
        assert_eq!(
            commands,
            vec![Command::AddRandomLoad, Command::AddServer, Command::Rebalance]
        );

        let err = parse_commands("ax").unwrap_err();
        assert_eq!(err.to_string(), "unknown command 'x'");
    }
}
