use futures::prelude::*;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio_serde::formats::*;
use tokio_serde::Framed;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

#[derive(Debug)]
pub enum Error {
    IO(std::io::Error),
    ReadError(std::io::Error),
    WriteError(std::io::Error),
}

pub type Reader<I, O> =
    Framed<FramedRead<OwnedReadHalf, LengthDelimitedCodec>, O, I, Bincode<O, I>>;

pub type Writer<I, O> =
    Framed<FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>, O, I, Bincode<O, I>>;

pub struct Receiver<I, O> {
    reader: Reader<I, O>,
}

impl<I, O> Receiver<I, O>
where
    I: for<'de> Deserialize<'de> + Serialize + Unpin,
    O: for<'de> Deserialize<'de> + Serialize + Unpin,
{
    /// Receives the next frame, `None` once the peer closed the connection.
    pub async fn recv(&mut self) -> Result<Option<O>, Error> {
        Ok(self.reader.try_next().await.map_err(Error::ReadError)?)
    }
}

pub struct Sender<I, O> {
    writer: Writer<I, O>,
}

impl<I, O> Sender<I, O>
where
    I: for<'de> Deserialize<'de> + Serialize + Unpin,
    O: for<'de> Deserialize<'de> + Serialize + Unpin,
{
    pub async fn send(&mut self, item: I) -> Result<(), Error> {
        Ok(self.writer.send(item).await.map_err(Error::WriteError)?)
    }
}

/// A length-delimited bincode channel over TCP sending `I` and receiving `O`.
pub struct Channel<I, O> {
    socket: TcpStream,
    ghost: std::marker::PhantomData<(I, O)>,
}

impl<I, O> Channel<I, O>
where
    I: for<'de> Deserialize<'de> + Serialize + Unpin,
    O: for<'de> Deserialize<'de> + Serialize + Unpin,
{
    pub async fn connect(address: &SocketAddr) -> Result<Channel<I, O>, Error> {
        let socket = TcpStream::connect(&address).await.map_err(Error::IO)?;
        Ok(Channel { socket, ghost: Default::default() })
    }

    pub async fn accept(listener: &TcpListener) -> Result<(Channel<I, O>, SocketAddr), Error> {
        let (socket, peer) = listener.accept().await.map_err(Error::IO)?;
        Ok((Channel { socket, ghost: Default::default() }, peer))
    }

    pub fn split(self) -> (Sender<I, O>, Receiver<I, O>) {
        let (reader, writer) = self.socket.into_split();

        let reader: FramedRead<OwnedReadHalf, LengthDelimitedCodec> =
            FramedRead::new(reader, LengthDelimitedCodec::new());
        let reader = Framed::new(reader, Bincode::default());

        let writer: FramedWrite<OwnedWriteHalf, LengthDelimitedCodec> =
            FramedWrite::new(writer, LengthDelimitedCodec::new());
        let writer = Framed::new(writer, Bincode::default());

        (Sender { writer }, Receiver { reader })
    }
}
